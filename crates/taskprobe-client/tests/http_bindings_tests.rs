use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use taskprobe_client::nodes::HttpNodeAgent;
use taskprobe_client::tracker::HttpJobTracker;
use taskprobe_client::{ClientError, JobTracker, NodeClient};
use taskprobe_core::model::{
    CompletionStatus, ControlAction, JobId, JobRunState, JobSpec, TaskAttemptId, TaskId,
    TaskRunState,
};

type Routes = Vec<(&'static str, u16, String)>;

struct StubServer {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<String>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StubServer {
    /// Each route is matched as a prefix of the request line.
    fn start(routes: Routes) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let stop_flag = Arc::clone(&stop);
        let seen = Arc::clone(&requests);
        let handle = thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, _)) => handle_conn(stream, &routes, &seen),
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            addr,
            stop,
            requests,
            handle: Some(handle),
        }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle_conn(mut stream: TcpStream, routes: &Routes, seen: &Mutex<Vec<String>>) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_millis(500)));
    let mut buf = vec![0_u8; 16 * 1024];
    let mut read = 0;
    // Read until the headers and the declared body have arrived.
    loop {
        let n = stream.read(&mut buf[read..]).unwrap_or(0);
        if n == 0 {
            break;
        }
        read += n;
        let text = String::from_utf8_lossy(&buf[..read]).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|l| {
                    let lower = l.to_ascii_lowercase();
                    lower
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                })
                .unwrap_or(0);
            if read >= header_end + 4 + content_length {
                break;
            }
        }
    }
    if read == 0 {
        return;
    }

    let request = String::from_utf8_lossy(&buf[..read]).to_string();
    let line = request.lines().next().unwrap_or_default().to_string();
    let body = request
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_default();
    seen.lock().unwrap().push(format!("{} {}", line, body));

    let (status, response_body) = routes
        .iter()
        .find(|(prefix, _, _)| line.starts_with(prefix))
        .map(|(_, status, body)| (*status, body.clone()))
        .unwrap_or((404, "{}".to_string()));

    let response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        response_body.len(),
        response_body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn tracker(server: &StubServer) -> HttpJobTracker {
    HttpJobTracker::new(server.base_url(), Duration::from_secs(5)).unwrap()
}

fn attempt(task: &str, index: u32) -> TaskAttemptId {
    TaskAttemptId::new(TaskId(task.to_string()), index)
}

#[test]
fn test_submit_job_returns_assigned_id() {
    let server = StubServer::start(vec![(
        "POST /jobs ",
        200,
        r#"{"job_id":"job_201012011234_0001"}"#.to_string(),
    )]);

    let spec = JobSpec::sleep(3, 1, 4000, 4000).with_max_attempts(20, 20);
    let job_id = tracker(&server).submit_job(&spec).unwrap();

    assert_eq!(job_id, JobId("job_201012011234_0001".to_string()));
    let requests = server.requests();
    assert!(requests[0].contains("\"max_map_attempts\":20"));
}

#[test]
fn test_rejected_submission_is_reported_as_such() {
    let server = StubServer::start(vec![(
        "POST /jobs ",
        400,
        r#"{"error":"input path does not exist"}"#.to_string(),
    )]);

    let err = tracker(&server)
        .submit_job(&JobSpec::sleep(1, 0, 10, 10))
        .unwrap_err();
    match err {
        ClientError::SubmissionRejected { reason } => {
            assert!(reason.contains("input path does not exist"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_status_and_task_queries_decode() {
    let server = StubServer::start(vec![
        (
            "GET /jobs/job_1_0001/tasks ",
            200,
            r#"[
                {"task_id":"task_1_0001_m_000001","is_bookkeeping":true,"execution_nodes":[],"attempts":[]},
                {"task_id":"task_1_0001_m_000000","execution_nodes":["tracker_node1:localhost/127.0.0.1:50060"],
                 "attempts":[{"attempt_id":"attempt_1_0001_m_000000_0","run_state":"RUNNING"}]}
            ]"#
            .to_string(),
        ),
        (
            "GET /jobs/job_1_0001/events?from=2 ",
            200,
            r#"[{"event_id":2,"attempt_id":"attempt_1_0001_m_000000_0","status":"KILLED"}]"#
                .to_string(),
        ),
        (
            "GET /jobs/job_1_0001 ",
            200,
            r#"{"job_id":"job_1_0001","run_state":"RUNNING","username":"probe"}"#.to_string(),
        ),
    ]);
    let tracker = tracker(&server);
    let job = JobId("job_1_0001".to_string());

    let status = tracker.job_status(&job).unwrap();
    assert_eq!(status.run_state, JobRunState::Running);
    assert!(!status.is_complete());

    let tasks = tracker.task_infos(&job).unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks[0].is_bookkeeping);
    assert_eq!(tasks[1].attempts[0].run_state, TaskRunState::Running);
    assert_eq!(
        tasks[1].attempts[0].attempt_id,
        attempt("task_1_0001_m_000000", 0)
    );

    let events = tracker.task_completion_events(&job, 2).unwrap();
    assert_eq!(events[0].status, CompletionStatus::Killed);
}

#[test]
fn test_kill_of_stale_attempt_is_a_control_channel_error() {
    let server = StubServer::start(vec![(
        "POST /attempts/attempt_1_0001_m_000000_0/kill ",
        409,
        r#"{"error":"attempt already KILLED"}"#.to_string(),
    )]);

    let err = tracker(&server)
        .kill_task_attempt(&attempt("task_1_0001_m_000000", 0), false)
        .unwrap_err();
    assert!(err.is_control_channel(), "got {err:?}");
}

#[test]
fn test_kill_sends_fail_flag() {
    let server = StubServer::start(vec![(
        "POST /attempts/attempt_1_0001_m_000000_1/kill ",
        200,
        "{}".to_string(),
    )]);

    tracker(&server)
        .kill_task_attempt(&attempt("task_1_0001_m_000000", 1), true)
        .unwrap();
    assert!(server.requests()[0].contains("\"fail_job\":true"));
}

#[test]
fn test_unreachable_tracker_kill_is_a_control_channel_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let tracker =
        HttpJobTracker::new(format!("http://{}", addr), Duration::from_millis(500)).unwrap();
    let err = tracker
        .kill_task_attempt(&attempt("task_1_0001_m_000000", 0), false)
        .unwrap_err();
    assert!(err.is_control_channel());
}

#[test]
fn test_node_agent_round_trip() {
    let server = StubServer::start(vec![
        ("POST /actions ", 200, "{}".to_string()),
        (
            "GET /local-dirs ",
            200,
            r#"{"local_dirs":["/data/1/mapred/local","/data/2/mapred/local"]}"#.to_string(),
        ),
        (
            "GET /ls?",
            200,
            r#"{"entries":[{"path":"/data/2/mapred/local/x/work","is_dir":true}]}"#.to_string(),
        ),
    ]);

    let agent =
        HttpNodeAgent::with_base_url("node1", server.base_url(), Duration::from_secs(5)).unwrap();

    agent
        .send_action(&ControlAction::FinishTask {
            task_id: TaskId("task_1_0001_m_000000".to_string()),
        })
        .unwrap();

    let dirs = agent.local_dirs().unwrap();
    assert_eq!(dirs[1], PathBuf::from("/data/2/mapred/local"));

    let entries = agent
        .list_status(Path::new("/data/2/mapred/local/x"), true)
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_dir);

    let requests = server.requests();
    assert!(requests[0].contains("\"type\":\"finish-task\""));
    assert!(requests[2].contains("recursive=true"));
}

#[test]
fn test_node_agent_action_failure_is_a_control_channel_error() {
    let server = StubServer::start(vec![("POST /actions ", 503, "{}".to_string())]);
    let agent =
        HttpNodeAgent::with_base_url("node1", server.base_url(), Duration::from_secs(5)).unwrap();

    let err = agent
        .send_action(&ControlAction::FinishTask {
            task_id: TaskId("task_1_0001_m_000000".to_string()),
        })
        .unwrap_err();
    assert!(err.is_control_channel());
}

#[test]
fn test_node_agent_missing_path_lists_empty() {
    let server = StubServer::start(vec![(
        "GET /ls?",
        404,
        r#"{"error":"no such path"}"#.to_string(),
    )]);
    let agent =
        HttpNodeAgent::with_base_url("node1", server.base_url(), Duration::from_secs(5)).unwrap();

    let entries = agent
        .list_status(Path::new("/data/2/mapred/local/gone"), true)
        .unwrap();
    assert!(entries.is_empty());
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn test_node_agent_listing_server_error_is_reported() {
    let server = StubServer::start(vec![("GET /ls?", 500, "{}".to_string())]);
    let agent =
        HttpNodeAgent::with_base_url("node1", server.base_url(), Duration::from_secs(5)).unwrap();

    let err = agent
        .list_status(Path::new("/data/2/mapred/local/x"), false)
        .unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 500, .. }));
}
