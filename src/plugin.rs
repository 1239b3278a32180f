//! Dispatch of host invocations onto a [`Session`].
//!
//! ```text
//! connect CONNINFO [debug]
//! disconnect [debug]
//! prepare SQLQUERY [debug]
//! populate_next [debug]
//! ```

use crate::client::Connector;
use crate::error::{Error, Result, ReturnCode};
use crate::host::Host;
use crate::session::{Progress, Session};

const USAGE: &str = "pg COMMAND [OPTS...]";
const USAGE_CONNECT: &str = "connect CONNINFO [\"debug\"]";
const USAGE_DISCONNECT: &str = "disconnect [\"debug\"]";
const USAGE_PREPARE: &str = "prepare SQLQUERY [\"debug\"]";
const USAGE_POPULATE_NEXT: &str = "populate_next [\"debug\"]";

/// Run one host invocation and return the code the host sees.
///
/// Errors are written to the host's error stream before returning.
pub fn call<K: Connector, H: Host>(
    session: &mut Session<K>,
    host: &mut H,
    args: &[&str],
) -> ReturnCode {
    match dispatch(session, host, args) {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = %e, "invocation failed");
            host.error(&e.to_string());
            e.return_code()
        }
    }
}

fn dispatch<K: Connector, H: Host>(
    session: &mut Session<K>,
    host: &mut H,
    args: &[&str],
) -> Result<ReturnCode> {
    let Some((command, rest)) = args.split_first() else {
        return Err(Error::Usage(USAGE));
    };

    match *command {
        "connect" => {
            check_args(rest, 1, 2, USAGE_CONNECT)?;
            session.connect(rest[0], host, is_debug(rest.get(1)))?;
        }
        "disconnect" => {
            check_args(rest, 0, 1, USAGE_DISCONNECT)?;
            session.disconnect(host, is_debug(rest.first()));
        }
        "prepare" => {
            check_args(rest, 1, 2, USAGE_PREPARE)?;
            session.prepare(rest[0], host, is_debug(rest.get(1)))?;
        }
        "populate_next" => {
            check_args(rest, 0, 1, USAGE_POPULATE_NEXT)?;
            return Ok(match session.populate_next(host, is_debug(rest.first()))? {
                Progress::More => ReturnCode::Ok,
                Progress::Finished => ReturnCode::Finished,
            });
        }
        other => {
            return Err(Error::BadUsageError(format!(
                "unrecognised command option {other:?}"
            )));
        }
    }
    Ok(ReturnCode::Ok)
}

fn check_args(args: &[&str], min: usize, max: usize, usage: &'static str) -> Result<()> {
    if (min..=max).contains(&args.len()) {
        Ok(())
    } else {
        Err(Error::Usage(usage))
    }
}

/// Any argument starting with `debug`, ignoring case, turns on debug output.
fn is_debug(arg: Option<&&str>) -> bool {
    arg.and_then(|a| a.get(..5))
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("debug"))
}
