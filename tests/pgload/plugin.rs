use crate::common::{FakeConnector, Script, field};
use pretty_assertions::assert_eq;
use zero_pgload::constant::Oid;
use zero_pgload::plugin::call;
use zero_pgload::{MemoryHost, ReturnCode, Session, SessionPhase};

#[test]
fn test_full_invocation_cycle() {
    let script = Script::new(vec![field("x", Oid::INT4), field("label", Oid::TEXT)])
        .row(&[Some("1"), Some("one")])
        .row(&[Some("2"), None]);
    let (connector, state) = FakeConnector::new(script);
    let mut session = Session::with_connector(connector);
    let mut host = MemoryHost::new();

    assert_eq!(
        call(&mut session, &mut host, &["connect", "dbname=test"]),
        ReturnCode::Ok
    );
    assert_eq!(
        call(&mut session, &mut host, &["prepare", "SELECT x, label FROM t"]),
        ReturnCode::Ok
    );
    assert_eq!(host.macro_value("_obs"), Some("2"));
    assert_eq!(host.macro_value("_types"), Some("double str244"));

    host.set_obs(2);
    assert_eq!(
        call(&mut session, &mut host, &["populate_next"]),
        ReturnCode::Finished
    );
    assert_eq!(host.number(1, 2), Some(2.0));
    assert_eq!(host.string(2, 1), Some("one"));
    assert_eq!(host.string(2, 2), None);

    assert_eq!(
        call(&mut session, &mut host, &["disconnect"]),
        ReturnCode::Ok
    );
    assert_eq!(session.phase(), SessionPhase::Disconnected);
    assert_eq!(state.borrow().disconnects, 1);
    assert!(host.errors().is_empty());
}

#[test]
fn test_errors_are_reported_to_the_host() {
    let (connector, _state) = FakeConnector::new(Script::new(vec![field("x", Oid::INT4)]));
    let mut session = Session::with_connector(connector);
    let mut host = MemoryHost::new();

    assert_eq!(
        call(&mut session, &mut host, &["connect", "dbname=test", "debug"]),
        ReturnCode::Ok
    );
    assert_eq!(host.displayed(), ["DEBUG: connected successfully".to_string()]);

    assert_eq!(
        call(&mut session, &mut host, &["populate_next"]),
        ReturnCode::Usage
    );
    assert_eq!(
        host.errors(),
        ["Must call \"prepare\" before calling \"populate_next\"".to_string()]
    );

    host.set_obs(1);
    assert_eq!(
        call(&mut session, &mut host, &["prepare", "SELECT 1"]),
        ReturnCode::DataInMemory
    );
    assert_eq!(host.errors()[1], "no; data in memory would be lost");
    assert_eq!(ReturnCode::DataInMemory.code(), 4);
}
