use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::batch::Page;
use crate::buffer::BufferSet;
use crate::client::Client;
use crate::constant::backend;
use crate::error::{Error, Result};
use crate::handler::{CollectHandler, DropHandler};
use crate::opts::Opts;
use crate::protocol::Action;
use crate::protocol::auth::{SCRAM_SHA_256, ScramSha256, md5_password};
use crate::protocol::backend::{AuthRequest, ServerError, TransactionStatus};
use crate::protocol::frontend::{
    write_password, write_sasl_initial_response, write_sasl_response, write_startup,
    write_terminate,
};
use crate::protocol::primitive::{read_int_4, read_string_null};
use crate::protocol::query::SimpleQuery;
use crate::protocol::r#trait::QueryHandler;

use super::stream::Stream;

/// Read one backend message into the buffer set.
#[tracing::instrument(skip_all)]
fn read_message_into(stream: &mut Stream, buffer_set: &mut BufferSet) -> Result<()> {
    let mut header = [0u8; 5];
    stream.read_exact(&mut header)?;
    buffer_set.type_byte = header[0];

    let length = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if length < 4 {
        return Err(Error::InvalidMessage(format!(
            "invalid message length: {length}"
        )));
    }

    buffer_set.read_buffer.clear();
    buffer_set.read_buffer.resize((length - 4) as usize, 0);
    stream.read_exact(&mut buffer_set.read_buffer)?;
    Ok(())
}

fn write_buffer(stream: &mut Stream, buffer_set: &BufferSet) -> Result<()> {
    stream.write_all(&buffer_set.write_buffer)?;
    stream.flush()?;
    Ok(())
}

/// Synchronous PostgreSQL connection speaking the simple query protocol
pub struct Conn {
    stream: Stream,
    buffer_set: BufferSet,
    backend_key: Option<(i32, i32)>,
    server_params: Vec<(String, String)>,
    transaction_status: TransactionStatus,
    is_broken: bool,
}

impl Conn {
    /// Connect to a PostgreSQL server
    pub fn new<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts: Opts = opts.try_into()?;

        let stream = match opts.socket_path() {
            #[cfg(unix)]
            Some(path) => Stream::unix(UnixStream::connect(path)?),
            #[cfg(not(unix))]
            Some(_) => {
                return Err(Error::BadConfigError(
                    "Unix sockets are not available on this platform".to_string(),
                ));
            }
            None => {
                if opts.host.is_empty() {
                    return Err(Error::BadConfigError(
                        "Missing host in connection options".to_string(),
                    ));
                }
                let tcp = connect_tcp(&opts)?;
                tcp.set_nodelay(opts.tcp_nodelay)?;
                Stream::tcp(tcp)
            }
        };

        Self::new_with_stream(stream, &opts)
    }

    /// Run startup and authentication over an existing stream
    pub fn new_with_stream(mut stream: Stream, opts: &Opts) -> Result<Self> {
        let mut buffer_set = BufferSet::new();

        let mut params = vec![("user", opts.user.as_str())];
        if let Some(dbname) = &opts.dbname {
            params.push(("database", dbname.as_str()));
        }
        params.push(("application_name", opts.application_name.as_str()));
        params.push(("client_encoding", "UTF8"));
        params.push(("DateStyle", "ISO, MDY"));
        write_startup(buffer_set.new_write_buffer(), &params)?;
        write_buffer(&mut stream, &buffer_set)?;

        let mut scram: Option<ScramSha256> = None;
        let mut backend_key = None;
        let mut server_params = Vec::new();

        let transaction_status = loop {
            read_message_into(&mut stream, &mut buffer_set)?;
            let payload = &buffer_set.read_buffer[..];

            match buffer_set.type_byte {
                backend::AUTHENTICATION => {
                    let mut out = Vec::new();
                    match AuthRequest::parse(payload)? {
                        AuthRequest::Ok => {
                            tracing::debug!(user = %opts.user, "authenticated");
                        }
                        AuthRequest::CleartextPassword => {
                            write_password(&mut out, require_password(opts)?)?;
                        }
                        AuthRequest::Md5Password { salt } => {
                            let hashed = md5_password(&opts.user, require_password(opts)?, &salt);
                            write_password(&mut out, &hashed)?;
                        }
                        AuthRequest::Sasl { mechanisms } => {
                            if !mechanisms.contains(&SCRAM_SHA_256) {
                                return Err(Error::UnsupportedAuth(mechanisms.join(", ")));
                            }
                            let exchange = ScramSha256::new(&opts.user, require_password(opts)?);
                            let first = exchange.client_first_message()?;
                            write_sasl_initial_response(&mut out, SCRAM_SHA_256, &first)?;
                            scram = Some(exchange);
                        }
                        AuthRequest::SaslContinue { data } => {
                            let exchange = scram.as_mut().ok_or_else(|| {
                                Error::InvalidMessage(
                                    "SASL continue without SASL start".to_string(),
                                )
                            })?;
                            let last = exchange.client_final_message(data)?;
                            write_sasl_response(&mut out, &last)?;
                        }
                        AuthRequest::SaslFinal { data } => {
                            let exchange = scram.as_ref().ok_or_else(|| {
                                Error::InvalidMessage("SASL final without SASL start".to_string())
                            })?;
                            exchange.verify_server_final(data)?;
                        }
                        AuthRequest::Other(code) => {
                            return Err(Error::UnsupportedAuth(format!(
                                "authentication request code {code}"
                            )));
                        }
                    }
                    if !out.is_empty() {
                        stream.write_all(&out)?;
                        stream.flush()?;
                    }
                }
                backend::PARAMETER_STATUS => {
                    let (name, rest) = read_string_null(payload)?;
                    let (value, _) = read_string_null(rest)?;
                    server_params.push((
                        String::from_utf8_lossy(name).into_owned(),
                        String::from_utf8_lossy(value).into_owned(),
                    ));
                }
                backend::BACKEND_KEY_DATA => {
                    let (pid, rest) = read_int_4(payload)?;
                    let (secret, _) = read_int_4(rest)?;
                    backend_key = Some((pid, secret));
                }
                backend::NOTICE_RESPONSE => {
                    let notice = ServerError::parse(payload)?;
                    tracing::warn!(sql_state = %notice.sql_state, "{notice}");
                }
                backend::ERROR_RESPONSE => {
                    return Err(ServerError::parse(payload)?.into());
                }
                backend::READY_FOR_QUERY => break TransactionStatus::parse(payload)?,
                other => {
                    return Err(Error::InvalidMessage(format!(
                        "unexpected message type '{}' during startup",
                        char::from(other)
                    )));
                }
            }
        };

        Ok(Self {
            stream,
            buffer_set,
            backend_key,
            server_params,
            transaction_status,
            is_broken: false,
        })
    }

    /// Process id and secret key for query cancellation
    pub fn backend_key(&self) -> Option<(i32, i32)> {
        self.backend_key
    }

    pub fn server_params(&self) -> &[(String, String)] {
        &self.server_params
    }

    /// Get a specific server parameter.
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.server_params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction_status.in_transaction()
    }

    pub fn is_broken(&self) -> bool {
        self.is_broken
    }

    /// Execute a simple query with a handler
    pub fn query<H: QueryHandler>(&mut self, sql: &str, handler: &mut H) -> Result<()> {
        let result = self.query_inner(sql, handler);
        if result.as_ref().is_err_and(Error::is_connection_broken) {
            self.is_broken = true;
        }
        result
    }

    #[tracing::instrument(skip_all)]
    fn query_inner<H: QueryHandler>(&mut self, sql: &str, handler: &mut H) -> Result<()> {
        if self.is_broken {
            return Err(Error::NotConnected);
        }

        let mut query = SimpleQuery::new(handler);
        query.start(sql, &mut self.buffer_set)?;
        write_buffer(&mut self.stream, &self.buffer_set)?;

        loop {
            read_message_into(&mut self.stream, &mut self.buffer_set)?;
            let step = query.step(&self.buffer_set);
            if self.buffer_set.type_byte == backend::READY_FOR_QUERY {
                self.transaction_status = query.transaction_status();
            }
            match step? {
                Action::NeedMessage => {}
                Action::Finished => return Ok(()),
            }
        }
    }

    /// Execute a simple query and discard results.
    ///
    /// Returns the row count carried by the command tag, if any.
    pub fn query_drop(&mut self, sql: &str) -> Result<Option<u64>> {
        let mut handler = DropHandler::default();
        self.query(sql, &mut handler)?;
        Ok(handler.rows_affected())
    }

    /// Execute a simple query and collect its first result set.
    pub fn query_collect(&mut self, sql: &str) -> Result<Page> {
        let mut handler = CollectHandler::default();
        self.query(sql, &mut handler)?;
        handler.into_page()
    }

    /// Close the connection gracefully.
    pub fn close(mut self) -> Result<()> {
        write_terminate(self.buffer_set.new_write_buffer());
        let result = write_buffer(&mut self.stream, &self.buffer_set);
        // Terminate has been sent; keep Drop from sending it again.
        self.is_broken = true;
        result
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        if self.is_broken {
            return;
        }
        write_terminate(self.buffer_set.new_write_buffer());
        let _ = write_buffer(&mut self.stream, &self.buffer_set);
    }
}

impl Client for Conn {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.query_drop(sql).map(drop)
    }

    fn fetch(&mut self, sql: &str) -> Result<Page> {
        self.query_collect(sql)
    }

    fn in_transaction(&self) -> bool {
        Conn::in_transaction(self)
    }

    fn is_broken(&self) -> bool {
        Conn::is_broken(self)
    }
}

fn require_password(opts: &Opts) -> Result<&str> {
    opts.password
        .as_deref()
        .ok_or_else(|| Error::AuthFailed("server requested a password but none was given".to_string()))
}

fn connect_tcp(opts: &Opts) -> Result<TcpStream> {
    let addr = (opts.host.as_str(), opts.port);
    let Some(timeout) = opts.connect_timeout else {
        return Ok(TcpStream::connect(addr)?);
    };

    let mut last_error = None;
    for socket_addr in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&socket_addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error
        .unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("could not resolve {}", opts.host),
            )
        })
        .into())
}
