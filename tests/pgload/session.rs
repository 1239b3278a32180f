use crate::common::{FakeConnector, Handle, Script, field, init_tracing};
use pretty_assertions::assert_eq;
use zero_pgload::batch::Field;
use zero_pgload::constant::Oid;
use zero_pgload::{Error, MemoryHost, Progress, Session, SessionPhase};

const CONNINFO: &str = "host=localhost dbname=test";

fn connected(script: Script) -> (Session<FakeConnector>, Handle, MemoryHost) {
    init_tracing();
    let (connector, state) = FakeConnector::new(script);
    let mut session = Session::with_connector(connector);
    let mut host = MemoryHost::new();
    session.connect(CONNINFO, &mut host, false).unwrap();
    (session, state, host)
}

fn int_rows(count: usize) -> Script {
    Script::new(vec![field("n", Oid::INT4)]).rows(count, |i| vec![Some(i.to_string())])
}

#[test]
fn test_select_one() {
    let (mut session, state, mut host) =
        connected(Script::new(vec![field("x", Oid::INT4)]).row(&[Some("1")]));

    session.prepare("SELECT 1 AS x", &mut host, false).unwrap();
    assert_eq!(session.phase(), SessionPhase::OpenQuery);
    assert_eq!(host.macro_value("_obs"), Some("1"));
    assert_eq!(host.macro_value("_vars"), Some("x"));
    assert_eq!(host.macro_value("_types"), Some("double"));
    assert_eq!(host.macro_value("_fmts"), Some("default"));

    host.set_obs(1);
    let progress = session.populate_next(&mut host, false).unwrap();
    assert_eq!(progress, Progress::Finished);
    assert_eq!(host.number(1, 1), Some(1.0));
    assert_eq!(host.macro_value("_obs"), Some("1"));

    assert_eq!(
        session.populate_next(&mut host, false).unwrap(),
        Progress::Finished
    );
    assert_eq!(state.borrow().commits(), 1);
    assert_eq!(state.borrow().rollbacks(), 0);
    assert!(session.open_query().unwrap().is_exhausted());

    assert_eq!(
        state.borrow().statements[..3],
        [
            "BEGIN TRANSACTION".to_string(),
            "DECLARE pgload_cursor CURSOR FOR SELECT 1 AS x".to_string(),
            "FETCH FORWARD 10000 FROM pgload_cursor".to_string(),
        ]
    );
}

#[test]
fn test_booleans_become_bytes() {
    let script = Script::new(vec![field("b", Oid::BOOL)])
        .row(&[Some("t")])
        .row(&[Some("f")])
        .row(&[None]);
    let (mut session, _state, mut host) = connected(script);

    session.prepare("SELECT b FROM flags", &mut host, false).unwrap();
    assert_eq!(host.macro_value("_types"), Some("byte"));
    session.populate_next(&mut host, false).unwrap();

    assert_eq!(host.number(1, 1), Some(1.0));
    assert_eq!(host.number(1, 2), Some(0.0));
    assert_eq!(host.number(1, 3), None);
}

#[test]
fn test_long_text_is_truncated() {
    let long = "y".repeat(300);
    let script = Script::new(vec![field("t", Oid::TEXT)]).row(&[Some(long.as_str())]);
    let (mut session, _state, mut host) = connected(script);

    session.prepare("SELECT t FROM notes", &mut host, false).unwrap();
    assert_eq!(host.macro_value("_types"), Some("str244"));
    session.populate_next(&mut host, false).unwrap();

    assert_eq!(host.string(1, 1), Some(&long[..244]));
    assert!(host.errors().is_empty());
}

#[test]
fn test_fixed_width_strings_and_dates() {
    let script = Script::new(vec![
        Field::new("code", Oid::VARCHAR, -1, 4 + 10),
        Field::new("wide", Oid::VARCHAR, -1, 4 + 1000),
        field("born", Oid::DATE),
        field("seen", Oid::TIMESTAMPTZ),
        field("small", Oid::INT2),
    ])
    .row(&[
        Some("AB-12"),
        Some("w"),
        Some("1970-01-01"),
        Some("2000-01-01 08:00:00+01"),
        Some("-32768"),
    ]);
    let (mut session, _state, mut host) = connected(script);

    session.prepare("SELECT * FROM people", &mut host, false).unwrap();
    assert_eq!(host.macro_value("_vars"), Some("code wide born seen small"));
    assert_eq!(
        host.macro_value("_types"),
        Some("str10 str244 long long long")
    );
    assert_eq!(
        host.macro_value("_fmts"),
        Some("default default %d %d default")
    );

    session.populate_next(&mut host, false).unwrap();
    assert_eq!(host.string(1, 1), Some("AB-12"));
    assert_eq!(host.number(3, 1), Some(3653.0));
    assert_eq!(host.number(4, 1), Some(14610.0));
    assert_eq!(host.number(5, 1), Some(-32768.0));
}

#[test]
fn test_fixed_width_multibyte_is_stored_whole() {
    let script = Script::new(vec![Field::new("c", Oid::VARCHAR, -1, 4 + 3)]).row(&[Some("ééé")]);
    let (mut session, _state, mut host) = connected(script);

    session.prepare("SELECT c FROM accents", &mut host, false).unwrap();
    assert_eq!(host.macro_value("_types"), Some("str3"));
    session.populate_next(&mut host, false).unwrap();

    assert_eq!(host.string(1, 1), Some("ééé"));
    assert!(host.errors().is_empty());
}

#[test]
fn test_paging_accounts_for_every_row() {
    let (connector, state) = FakeConnector::new(int_rows(10));
    let mut session = Session::with_connector(connector).with_page_size(3);
    let mut host = MemoryHost::new();
    session.connect(CONNINFO, &mut host, false).unwrap();

    session.prepare("SELECT n FROM numbers", &mut host, false).unwrap();
    assert_eq!(host.macro_value("_obs"), Some("3"));

    let mut loaded = Vec::new();
    let mut calls = 0;
    loop {
        calls += 1;
        let progress = session.populate_next(&mut host, false).unwrap();
        let query = session.open_query().unwrap();
        assert!(query.loaded() <= query.known());
        loaded.push(query.loaded());
        if progress == Progress::Finished {
            break;
        }
    }

    assert_eq!(calls, 4);
    assert_eq!(loaded, vec![3, 6, 9, 10]);
    assert_eq!(host.macro_value("_obs"), Some("10"));
    let values = host.numbers_in(1);
    assert_eq!(values.len(), 10);
    assert_eq!(values.iter().map(|(_, v)| v).sum::<f64>(), 45.0);
    assert_eq!(values.first(), Some(&(1, 0.0)));
    assert_eq!(values.last(), Some(&(10, 9.0)));
    assert_eq!(state.borrow().fetches, 5);
    assert_eq!(state.borrow().commits(), 1);
}

#[test]
fn test_empty_result_finishes_immediately() {
    let (mut session, state, mut host) = connected(int_rows(0));

    session.prepare("SELECT n FROM numbers WHERE false", &mut host, false).unwrap();
    assert_eq!(host.macro_value("_obs"), Some("0"));
    assert_eq!(
        session.populate_next(&mut host, false).unwrap(),
        Progress::Finished
    );
    assert_eq!(state.borrow().fetches, 1);
    assert_eq!(state.borrow().commits(), 1);
}

#[test]
fn test_disconnect_is_idempotent() {
    let (connector, state) = FakeConnector::new(int_rows(1));
    let mut session = Session::with_connector(connector);
    let mut host = MemoryHost::new();

    session.disconnect(&mut host, false);
    session.disconnect(&mut host, false);
    assert_eq!(session.phase(), SessionPhase::Disconnected);

    session.connect(CONNINFO, &mut host, false).unwrap();
    session.prepare("SELECT n FROM numbers", &mut host, false).unwrap();
    session.disconnect(&mut host, false);
    session.disconnect(&mut host, false);

    assert_eq!(session.phase(), SessionPhase::Disconnected);
    assert_eq!(state.borrow().disconnects, 1);
    assert_eq!(state.borrow().rollbacks(), 1);
    assert!(host.errors().is_empty());
}

#[test]
fn test_failed_fetch_rolls_back_to_idle() {
    let mut script = int_rows(5);
    script.fail_fetch = Some(2);
    let (connector, state) = FakeConnector::new(script);
    let mut session = Session::with_connector(connector).with_page_size(2);
    let mut host = MemoryHost::new();
    session.connect(CONNINFO, &mut host, false).unwrap();
    session.prepare("SELECT n FROM numbers", &mut host, false).unwrap();

    let err = session.populate_next(&mut host, false).unwrap_err();
    assert!(matches!(err, Error::Query(ref inner) if matches!(**inner, Error::ServerError(_))));
    assert_eq!(err.return_code().code(), 200);

    assert_eq!(session.phase(), SessionPhase::Idle);
    assert!(session.open_query().is_none());
    let state = state.borrow();
    assert_eq!(state.rollbacks(), 1);
    assert!(!state.in_transaction);
    assert_eq!(state.disconnects, 0);
}

#[test]
fn test_failed_rollback_is_reported() {
    let mut script = int_rows(5);
    script.fail_fetch = Some(2);
    script.fail_rollbacks = 1;
    let (connector, state) = FakeConnector::new(script);
    let mut session = Session::with_connector(connector).with_page_size(2);
    let mut host = MemoryHost::new();
    session.connect(CONNINFO, &mut host, false).unwrap();
    session.prepare("SELECT n FROM numbers", &mut host, false).unwrap();

    let err = session.populate_next(&mut host, false).unwrap_err();
    assert!(matches!(err, Error::Query(_)));
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert!(session.open_query().is_none());
    assert_eq!(
        host.errors(),
        ["rollback failed: ERROR:  could not roll back the transaction".to_string()]
    );
    assert!(state.borrow().in_transaction);

    let mut host = MemoryHost::new();
    session.prepare("SELECT n FROM numbers", &mut host, false).unwrap();
    assert_eq!(session.phase(), SessionPhase::OpenQuery);
    assert!(host.errors().is_empty());
    {
        let state = state.borrow();
        assert_eq!(state.rollbacks(), 2);
        assert_eq!(state.count("BEGIN"), 2);
        assert_eq!(state.disconnects, 0);
    }

    while session.populate_next(&mut host, false).unwrap() == Progress::More {}
    assert_eq!(host.numbers_in(1).len(), 5);
}

#[test]
fn test_session_is_reusable_after_failure() {
    let mut script = int_rows(4);
    script.fail_fetch = Some(1);
    let (connector, state) = FakeConnector::new(script);
    let mut session = Session::with_connector(connector);
    let mut host = MemoryHost::new();
    session.connect(CONNINFO, &mut host, false).unwrap();

    let err = session.prepare("SELECT n FROM numbers", &mut host, false).unwrap_err();
    assert!(matches!(err, Error::SchemaResolution(_)));
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(state.borrow().rollbacks(), 1);

    session.prepare("SELECT n FROM numbers", &mut host, false).unwrap();
    assert_eq!(
        session.populate_next(&mut host, false).unwrap(),
        Progress::Finished
    );
    assert_eq!(host.numbers_in(1).len(), 4);
}

#[test]
fn test_failed_declare_is_a_query_error() {
    let mut script = int_rows(1);
    script.fail_declare = true;
    let (mut session, state, mut host) = connected(script);

    let err = session.prepare("SELEC 1", &mut host, false).unwrap_err();
    assert!(matches!(err, Error::Query(_)));
    assert_eq!(
        err.to_string(),
        "ERROR:  syntax error at or near \"SELEC\""
    );
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(state.borrow().rollbacks(), 1);
    assert_eq!(state.borrow().count("FETCH"), 0);
}

#[test]
fn test_broken_connection_is_torn_down() {
    let mut script = int_rows(5);
    script.break_on_fetch = Some(2);
    let (connector, state) = FakeConnector::new(script);
    let mut session = Session::with_connector(connector).with_page_size(2);
    let mut host = MemoryHost::new();
    session.connect(CONNINFO, &mut host, false).unwrap();
    session.prepare("SELECT n FROM numbers", &mut host, false).unwrap();

    let err = session.populate_next(&mut host, false).unwrap_err();
    assert!(err.is_connection_broken());
    assert_eq!(session.phase(), SessionPhase::Disconnected);
    assert_eq!(state.borrow().disconnects, 1);
    assert_eq!(state.borrow().rollbacks(), 0);

    let err = session.populate_next(&mut host, false).unwrap_err();
    assert!(matches!(err, Error::NotConnected));
}

#[test]
fn test_bad_date_aborts_the_batch() {
    let script = Script::new(vec![field("d", Oid::DATE)])
        .row(&[Some("2021-05-06")])
        .row(&[Some("infinity")]);
    let (mut session, state, mut host) = connected(script);
    session.prepare("SELECT d FROM events", &mut host, false).unwrap();

    let err = session.populate_next(&mut host, false).unwrap_err();
    assert!(matches!(err, Error::DateParse { obs: 2, var: 1, .. }));
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(state.borrow().rollbacks(), 1);
}

#[test]
fn test_host_write_failure_aborts_the_batch() {
    let (mut session, state, mut host) = connected(int_rows(3));
    session.prepare("SELECT n FROM numbers", &mut host, false).unwrap();

    host.fail_store_at(2, 1, 459);
    let err = session.populate_next(&mut host, false).unwrap_err();
    assert_eq!(err.to_string(), "failed to store oid:23 at (2,1): host call failed with code 459");
    assert_eq!(err.return_code().code(), 459);
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(state.borrow().rollbacks(), 1);
}

#[test]
fn test_unknown_type_is_looked_up_and_degraded() {
    let mut script = Script::new(vec![field("doc", Oid(3802))]).row(&[Some("{\"a\": 1}")]);
    script.type_names.push((3802, "jsonb".to_string()));
    let (mut session, state, mut host) = connected(script);

    session.prepare("SELECT doc FROM docs", &mut host, false).unwrap();
    assert_eq!(host.macro_value("_types"), Some("str244"));
    assert_eq!(
        host.errors(),
        ["Type \"jsonb\" (column doc) is only partially supported: treating it as str244".to_string()]
    );
    {
        let state = state.borrow();
        assert_eq!(state.count("SAVEPOINT"), 1);
        assert_eq!(state.count("SELECT typname FROM pg_type WHERE oid=3802"), 1);
        assert_eq!(state.count("RELEASE SAVEPOINT"), 1);
        assert_eq!(state.count("ROLLBACK TO SAVEPOINT"), 0);
    }

    session.populate_next(&mut host, false).unwrap();
    assert_eq!(host.string(1, 1), Some("{\"a\": 1}"));
}

#[test]
fn test_failed_type_lookup_is_not_fatal() {
    let mut script = Script::new(vec![field("geom", Oid(16_400))]).row(&[Some("POINT(1 2)")]);
    script.fail_type_lookup = true;
    let (mut session, state, mut host) = connected(script);

    session.prepare("SELECT geom FROM shapes", &mut host, false).unwrap();
    assert!(host.errors()[0].starts_with("Internal error: type-name lookup failed."));
    assert_eq!(
        host.errors()[1],
        "Type \"unknown\" (column geom) is only partially supported: treating it as str244"
    );
    assert_eq!(state.borrow().count("ROLLBACK TO SAVEPOINT"), 1);

    assert_eq!(
        session.populate_next(&mut host, false).unwrap(),
        Progress::Finished
    );
    assert_eq!(host.string(1, 1), Some("POINT(1 2)"));
}

#[test]
fn test_partially_supported_types_skip_the_lookup() {
    let script = Script::new(vec![field("price", Oid::MONEY), field("gap", Oid::INTERVAL)])
        .row(&[Some("$1.50"), Some("1 day")]);
    let (mut session, state, mut host) = connected(script);

    session.prepare("SELECT price, gap FROM orders", &mut host, false).unwrap();
    assert_eq!(host.errors().len(), 2);
    assert!(host.errors()[0].starts_with("Type \"money\" (column price)"));
    assert_eq!(state.borrow().count("SELECT typname"), 0);

    session.populate_next(&mut host, false).unwrap();
    assert_eq!(host.string(1, 1), Some("$1.50"));
    assert_eq!(host.string(2, 1), Some("1 day"));
}

#[test]
fn test_prepare_refuses_to_clobber_data() {
    let (mut session, state, mut host) = connected(int_rows(1));
    host.set_obs(7);

    let err = session.prepare("SELECT n FROM numbers", &mut host, false).unwrap_err();
    assert!(matches!(err, Error::DataInMemory));
    assert_eq!(err.return_code().code(), 4);
    assert!(state.borrow().statements.is_empty());
    assert_eq!(session.phase(), SessionPhase::Idle);
}

#[test]
fn test_populate_before_prepare() {
    let (mut session, _state, mut host) = connected(int_rows(1));

    let err = session.populate_next(&mut host, false).unwrap_err();
    assert!(matches!(err, Error::NoPreparedQuery));
    assert_eq!(err.return_code().code(), 198);
    assert_eq!(session.phase(), SessionPhase::Idle);
}

#[test]
fn test_prepare_replaces_an_open_query() {
    let (mut session, state, mut host) = connected(int_rows(2));
    session.prepare("SELECT n FROM numbers", &mut host, false).unwrap();
    session.prepare("SELECT n FROM numbers", &mut host, false).unwrap();

    assert_eq!(session.phase(), SessionPhase::OpenQuery);
    let state = state.borrow();
    assert_eq!(state.rollbacks(), 1);
    assert_eq!(state.count("BEGIN"), 2);
}

#[test]
fn test_connect_replaces_an_existing_connection() {
    let (mut session, state, mut host) = connected(int_rows(1));
    session.prepare("SELECT n FROM numbers", &mut host, false).unwrap();

    session.connect(CONNINFO, &mut host, false).unwrap();
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(
        host.errors(),
        ["already connected: closing existing connection first".to_string()]
    );
    let state = state.borrow();
    assert_eq!(state.connects, 2);
    assert_eq!(state.disconnects, 1);
    assert_eq!(state.rollbacks(), 1);
}

#[test]
fn test_failed_connect_stays_disconnected() {
    let mut script = int_rows(1);
    script.fail_connect = true;
    let (connector, _state) = FakeConnector::new(script);
    let mut session = Session::with_connector(connector);
    let mut host = MemoryHost::new();

    let err = session.connect(CONNINFO, &mut host, false).unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
    assert!(err.to_string().starts_with("Database error: connection failed.\n"));
    assert_eq!(session.phase(), SessionPhase::Disconnected);
}

#[test]
fn test_debug_mode_echoes_statements() {
    let (mut session, _state, mut host) = connected(int_rows(1));
    session.prepare("SELECT n FROM numbers", &mut host, true).unwrap();

    let displayed = host.displayed();
    assert_eq!(displayed[0], "BEGIN TRANSACTION");
    assert!(displayed.iter().any(|l| l == "DEBUG: name=n size=-1 oid=23 mod=-1"));
    assert!(displayed.iter().any(|l| l == "DEBUG: _types: double"));

    let shown = host.displayed().len();
    session.populate_next(&mut host, false).unwrap();
    assert_eq!(host.displayed().len(), shown);
}
