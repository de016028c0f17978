use crate::app::{ShutdownHandle, ShutdownReason};
use crate::hardware::ManualTrigger;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Motion,
    Ignore,
}

/// `q`, Esc and Ctrl+C quit; space counts as one motion reading
pub fn key_action(key: &KeyEvent) -> KeyAction {
    if key.kind != KeyEventKind::Press {
        return KeyAction::Ignore;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char(' ') => KeyAction::Motion,
        _ => KeyAction::Ignore,
    }
}

/// Act on one key. Returns `false` once input handling should stop.
///
/// Quitting only requests the shutdown; the orchestrator announces it.
fn apply_action(action: KeyAction, shutdown: &ShutdownHandle, trigger: &ManualTrigger) -> bool {
    match action {
        KeyAction::Motion => {
            info!("Space bar pressed - simulating motion");
            trigger.pulse();
            true
        }
        KeyAction::Quit => {
            info!("Quit key pressed - requesting shutdown");
            shutdown.request(ShutdownReason::UserRequest);
            false
        }
        KeyAction::Ignore => true,
    }
}

/// Keyboard control for bench runs
pub struct KeyboardInputHandler {
    shutdown: ShutdownHandle,
    trigger: ManualTrigger,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(shutdown: ShutdownHandle, trigger: ManualTrigger) -> Self {
        Self {
            shutdown,
            trigger,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub fn start(&self) {
        info!("Keyboard control active - SPACE simulates motion, q quits");

        let shutdown = self.shutdown.clone();
        let trigger = self.trigger.clone();
        let cancellation_token = self.cancellation_token.clone();

        // Raw-mode polling blocks, so it gets its own thread
        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            while !cancellation_token.is_cancelled() && !shutdown.is_requested() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        let action = key_action(&key_event);
                        if action == KeyAction::Ignore {
                            debug!("Key ignored: {:?}", key_event.code);
                        }
                        if !apply_action(action, &shutdown, &trigger) {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard input handler task exited");
        });
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the polling thread one poll period to restore the terminal
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_key_actions() {
        assert_eq!(
            key_action(&press(KeyCode::Char(' '), KeyModifiers::NONE)),
            KeyAction::Motion
        );
        assert_eq!(
            key_action(&press(KeyCode::Char('q'), KeyModifiers::NONE)),
            KeyAction::Quit
        );
        assert_eq!(key_action(&press(KeyCode::Esc, KeyModifiers::NONE)), KeyAction::Quit);
        assert_eq!(
            key_action(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyAction::Quit
        );
        assert_eq!(
            key_action(&press(KeyCode::Char('c'), KeyModifiers::NONE)),
            KeyAction::Ignore
        );
    }

    #[test]
    fn test_release_events_ignored() {
        let mut release = press(KeyCode::Char(' '), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(key_action(&release), KeyAction::Ignore);
    }

    #[test]
    fn test_quit_requests_user_shutdown() {
        let shutdown = ShutdownHandle::new();
        let trigger = ManualTrigger::new();

        assert!(apply_action(KeyAction::Ignore, &shutdown, &trigger));
        assert!(apply_action(KeyAction::Motion, &shutdown, &trigger));
        assert!(trigger.take());
        assert!(!shutdown.is_requested());

        assert!(!apply_action(KeyAction::Quit, &shutdown, &trigger));
        assert_eq!(shutdown.reason(), Some(ShutdownReason::UserRequest));
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let handler = KeyboardInputHandler::new(ShutdownHandle::new(), ManualTrigger::new());
        assert!(!handler.is_stopped());

        handler.stop().await;
        assert!(handler.is_stopped());
    }
}
