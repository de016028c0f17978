use serde::Serialize;

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
}

impl ShutdownReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Signal(_) | ShutdownReason::UserRequest => 0,
            ShutdownReason::Error(_) => 1,
        }
    }

    /// Final two display lines
    pub fn display_lines(&self) -> (String, String) {
        match self {
            ShutdownReason::UserRequest => ("System Quitting".to_string(), String::new()),
            ShutdownReason::Signal(name) if name == "SIGINT" => {
                ("System Halted".to_string(), "User Interrupt".to_string())
            }
            ShutdownReason::Signal(name) => ("System Halted".to_string(), name.clone()),
            ShutdownReason::Error(message) => ("FATAL ERROR".to_string(), message.clone()),
        }
    }
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "signal {}", name),
            ShutdownReason::Error(message) => write!(f, "error: {}", message),
            ShutdownReason::UserRequest => write!(f, "user request"),
        }
    }
}

/// Counters for one run of the detection loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub motion_polls: u64,
    pub windows_opened: u64,
    pub frames_processed: u64,
    pub frame_read_failures: u64,
    pub faces_observed: u64,
    pub alerts_raised: u64,
    pub alerts_suppressed: u64,
    pub alerts_recorded: u64,
}
