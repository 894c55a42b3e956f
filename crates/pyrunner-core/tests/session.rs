//! Session behavior against a scripted engine.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use pyrunner_core::{
    Bindings, CapturedStreams, Engine, Execution, Fault, Frame, PrintOptions, ProtocolError,
    ProtocolMessage, ProtocolPeer, RunStatus, RunnerConfig, Session, SessionError, SessionState,
};
use tokio::io::AsyncReadExt;

#[derive(Clone)]
enum Step {
    Print(Vec<&'static str>),
    Echo(&'static str),
    RawOut(&'static str),
    RawErr(&'static str),
    Fail(Fault),
    Panic,
    /// Keep a copy of the bindings after the run, as an interpreter might.
    Leak(Arc<Mutex<Vec<Bindings>>>),
}

struct ScriptedEngine {
    steps: Vec<Step>,
}

impl ScriptedEngine {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self { steps })
    }
}

impl Engine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn execute(&self, _code: &str, bindings: &Bindings) -> Execution {
        let mut captured = CapturedStreams::default();
        let opts = PrintOptions::default();
        for step in &self.steps {
            match step {
                Step::Print(args) => bindings.output.print(args.as_slice(), &opts).unwrap(),
                Step::Echo(prompt) => {
                    let reply = bindings.input.request_input(prompt).unwrap();
                    bindings.output.print(&[reply], &opts).unwrap();
                }
                Step::RawOut(text) => captured.stdout.push_str(text),
                Step::RawErr(text) => captured.stderr.push_str(text),
                Step::Fail(fault) => return Execution::faulted(captured, fault.clone()),
                Step::Panic => panic!("engine blew up"),
                Step::Leak(store) => store.lock().unwrap().push(bindings.clone()),
            }
        }
        Execution::completed(captured)
    }
}

async fn invoke(engine: Arc<dyn Engine>, inbound: &'static [u8]) -> (RunStatus, Vec<ProtocolMessage>) {
    let (client, mut server) = tokio::io::duplex(64 * 1024);
    let peer = ProtocolPeer::new(inbound, client);

    let status = pyrunner_core::run(&RunnerConfig::default(), "sess-1", peer, engine)
        .await
        .unwrap();

    let mut out = String::new();
    server.read_to_string(&mut out).await.unwrap();
    let messages = out
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    (status, messages)
}

const CODE: &[u8] = b"code\n__END_OF_CODE__\n";

#[tokio::test(flavor = "multi_thread")]
async fn test_each_print_is_one_message_in_order() {
    let engine = ScriptedEngine::new(vec![
        Step::Print(vec!["hi"]),
        Step::Print(vec!["a", "b"]),
        Step::Print(vec!["trailing\n"]),
    ]);

    let (status, messages) = invoke(engine, CODE).await;

    assert!(status.is_success());
    assert_eq!(
        messages,
        vec![
            ProtocolMessage::output("hi"),
            ProtocolMessage::output("a b"),
            ProtocolMessage::output("trailing"),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_input_round_trip() {
    let engine = ScriptedEngine::new(vec![Step::Echo("name: ")]);

    let (_, messages) = invoke(engine, b"code\n__END_OF_CODE__\nAda\n").await;

    assert_eq!(
        messages,
        vec![
            ProtocolMessage::input_request("name: ", "sess-1"),
            ProtocolMessage::output("Ada"),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_input_at_end_of_stream_is_empty() {
    let engine = ScriptedEngine::new(vec![Step::Echo("a? "), Step::Echo("b? ")]);

    let (_, messages) = invoke(engine, b"code\n__END_OF_CODE__\nfirst\r\n").await;

    assert_eq!(
        messages,
        vec![
            ProtocolMessage::input_request("a? ", "sess-1"),
            ProtocolMessage::output("first"),
            ProtocolMessage::input_request("b? ", "sess-1"),
            ProtocolMessage::output(""),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_raw_writes_flush_once_after_primitive_output() {
    let engine = ScriptedEngine::new(vec![
        Step::RawOut("one\n"),
        Step::Print(vec!["direct"]),
        Step::RawOut("two\n"),
        Step::RawErr("careful\n"),
    ]);

    let (status, messages) = invoke(engine, CODE).await;

    assert_eq!(
        messages,
        vec![
            ProtocolMessage::output("direct"),
            ProtocolMessage::output("one\ntwo"),
            ProtocolMessage::error("careful"),
        ]
    );
    let RunStatus::Executed(report) = status else {
        panic!("expected execution");
    };
    assert_eq!(report.state, SessionState::Completed);
    assert_eq!(report.messages_flushed, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_flush_for_empty_buffers() {
    let engine = ScriptedEngine::new(vec![Step::Print(vec!["only"])]);

    let (_, messages) = invoke(engine, CODE).await;

    assert_eq!(messages, vec![ProtocolMessage::output("only")]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fault_is_last_after_partial_output() {
    let fault = Fault::new("ZeroDivisionError", "division by zero")
        .with_frame(Frame::new("<string>", Some(2), "<module>"));
    let engine = ScriptedEngine::new(vec![
        Step::Print(vec!["before"]),
        Step::RawOut("partial"),
        Step::Fail(fault),
        Step::Print(vec!["never"]),
    ]);

    let (status, messages) = invoke(engine, CODE).await;

    assert!(status.is_success());
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0], ProtocolMessage::output("before"));
    assert_eq!(messages[1], ProtocolMessage::output("partial"));
    let ProtocolMessage::Error { content } = &messages[2] else {
        panic!("expected error, got {:?}", messages[2]);
    };
    assert!(content.starts_with("Traceback (most recent call last):"));
    assert!(content.contains("line 2, in <module>"));
    assert!(content.ends_with("ZeroDivisionError: division by zero"));

    let RunStatus::Executed(report) = status else {
        panic!("expected execution");
    };
    assert_eq!(report.state, SessionState::Faulted);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_engine_panic_becomes_error_message() {
    let engine = ScriptedEngine::new(vec![Step::Print(vec!["x"]), Step::Panic]);

    let (status, messages) = invoke(engine, CODE).await;

    assert!(status.is_success());
    assert_eq!(
        messages,
        vec![
            ProtocolMessage::output("x"),
            ProtocolMessage::error("EnginePanic: engine blew up"),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_code_provided() {
    let engine = ScriptedEngine::new(vec![Step::Print(vec!["unreachable"])]);

    let (status, messages) = invoke(engine, b"__END_OF_CODE__\n").await;

    assert_eq!(status, RunStatus::NoCode);
    assert!(!status.is_success());
    assert_eq!(messages, vec![ProtocolMessage::error("No code provided")]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_session_runs_once() {
    let session = Session::new("s", ProtocolPeer::new(tokio::io::empty(), tokio::io::sink()));
    let engine = ScriptedEngine::new(vec![]);

    let report = session.run(engine.clone(), "pass".into()).await.unwrap();
    assert_eq!(report.state, SessionState::Completed);
    assert_eq!(session.state(), SessionState::Completed);

    let again = session.run(engine, "pass".into()).await;
    assert!(matches!(again, Err(SessionError::AlreadyRan)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_leaked_bindings_do_not_hold_the_writer_open() {
    let store = Arc::new(Mutex::new(Vec::new()));
    let engine = ScriptedEngine::new(vec![Step::Print(vec!["hi"]), Step::Leak(store.clone())]);

    let (_, messages) = tokio::time::timeout(Duration::from_secs(10), invoke(engine, CODE))
        .await
        .expect("outbound stream never reached end of stream");

    assert_eq!(messages, vec![ProtocolMessage::output("hi")]);
    let leaked = store.lock().unwrap().pop().unwrap();
    let late = leaked.output.print(&["late"], &PrintOptions::default());
    assert!(matches!(late, Err(ProtocolError::Closed)));
    assert!(matches!(leaked.input.request_input("? "), Err(ProtocolError::Closed)));
}
