//! Chat commands arriving through the polling loop

use logrelay::{RelayError, User, UserReader, UserRepository};

use crate::support::RunningApp;

const SUPERUSER: i64 = 999;

fn users(running: &RunningApp) -> UserRepository {
    UserRepository::new(running.app.store())
}

/// "Welcome!\nYour ID is <id>" → "<id>"
fn id_from_welcome(text: &str) -> String {
    text.strip_prefix("Welcome!\nYour ID is ")
        .unwrap_or_else(|| panic!("unexpected reply: {:?}", text))
        .to_string()
}

// =============================================================================
// Self-Registration
// =============================================================================

#[test]
fn test_start_registers_chat() {
    let running = RunningApp::start();

    running.transport.push_message(1, 42, "/start");
    let (chat_id, reply) = running.transport.next_sent();

    assert_eq!(chat_id, 42);
    let id = id_from_welcome(&reply);
    assert_eq!(id.len(), 36);
    assert_eq!(
        users(&running).get(&id).unwrap(),
        User {
            id,
            external_chat_id: 42
        }
    );

    running.shutdown().unwrap_err();
}

#[test]
fn test_start_again_replaces_previous_id() {
    let running = RunningApp::start();

    running.transport.push_message(1, 42, "/start");
    let first = id_from_welcome(&running.transport.next_sent().1);
    running.transport.push_message(2, 42, "/start@relay_bot");
    let second = id_from_welcome(&running.transport.next_sent().1);

    assert_ne!(first, second);
    let repo = users(&running);
    assert!(matches!(repo.get(&first), Err(RelayError::NotFound)));
    assert_eq!(repo.find_by_external_chat_id(42).unwrap().id, second);
    assert_eq!(repo.get_all().unwrap().len(), 1);

    running.shutdown().unwrap_err();
}

#[test]
fn test_stop_unregisters_chat() {
    let running = RunningApp::start();
    running.transport.push_message(1, 42, "/start");
    running.transport.next_sent();

    running.transport.push_message(2, 42, "/stop");
    let (chat_id, reply) = running.transport.next_sent();

    assert_eq!(chat_id, 42);
    assert_eq!(reply, "Bye!\nChat ID 42 has been removed from the system.");
    assert!(matches!(
        users(&running).find_by_external_chat_id(42),
        Err(RelayError::NotFound)
    ));

    running.shutdown().unwrap_err();
}

#[test]
fn test_plain_text_gets_no_reply() {
    let running = RunningApp::start();

    running.transport.push_message(1, 42, "hello bot");
    running.transport.push_message(2, 42, "/stop");

    // Only the command is answered
    let (_, reply) = running.transport.next_sent();
    assert!(reply.starts_with("Bye!"));
    assert_eq!(running.transport.sent().len(), 1);

    running.shutdown().unwrap_err();
}

// =============================================================================
// Superuser Commands
// =============================================================================

#[test]
fn test_add_user_as_superuser() {
    let running = RunningApp::start();

    running
        .transport
        .push_message(1, SUPERUSER, "/addUser -100200300");
    let (chat_id, reply) = running.transport.next_sent();

    assert_eq!(chat_id, SUPERUSER);
    let created = users(&running).find_by_external_chat_id(-100200300).unwrap();
    assert_eq!(
        reply,
        format!("User created\nChat ID: -100200300\nID: {}", created.id)
    );

    running.shutdown().unwrap_err();
}

#[test]
fn test_add_user_argument_errors() {
    let running = RunningApp::start();

    running.transport.push_message(1, SUPERUSER, "/addUser");
    assert_eq!(running.transport.next_sent().1, "insufficient arguments");

    running.transport.push_message(2, SUPERUSER, "/addUser forty-two");
    assert_eq!(running.transport.next_sent().1, "could not parse chat ID");

    assert!(users(&running).get_all().unwrap().is_empty());
    running.shutdown().unwrap_err();
}

#[test]
fn test_superuser_commands_refused_for_others() {
    let running = RunningApp::start();

    running.transport.push_message(1, 42, "/getAllUsers");
    assert_eq!(
        running.transport.next_sent(),
        (42, "unauthorized to use command".to_string())
    );

    running.transport.push_message(2, 42, "/addUser 7");
    assert_eq!(running.transport.next_sent().1, "unauthorized to use command");
    assert!(users(&running).get_all().unwrap().is_empty());

    running.shutdown().unwrap_err();
}

#[test]
fn test_get_all_users_lists_registrations() {
    let running = RunningApp::start();
    running.transport.push_message(1, 42, "/start");
    let id = id_from_welcome(&running.transport.next_sent().1);

    running.transport.push_message(2, SUPERUSER, "/getAllUsers");
    let (chat_id, reply) = running.transport.next_sent();

    assert_eq!(chat_id, SUPERUSER);
    let listed: Vec<User> = serde_json::from_str(&reply).unwrap();
    assert_eq!(
        listed,
        vec![User {
            id,
            external_chat_id: 42
        }]
    );

    running.shutdown().unwrap_err();
}

#[test]
fn test_storage_failure_gets_generic_reply() {
    let running = RunningApp::start();
    running.app.store().close().unwrap();

    running.transport.push_message(1, 42, "/start");

    assert_eq!(
        running.transport.next_sent(),
        (
            42,
            "error when cleaning up the database by telegram chat ID".to_string()
        )
    );
    running.shutdown().unwrap_err();
}
