use std::path::PathBuf;

use tasktrack::error::{exit_codes, Error, JsonError};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let missing = Error::TaskNotFound("a".to_string());
    assert_eq!(missing.exit_code(), exit_codes::USER_ERROR);

    let lock = Error::LockFailed(PathBuf::from("tasks.lock"));
    assert_eq!(lock.exit_code(), exit_codes::OPERATION_FAILED);

    let op = Error::OperationFailed("boom".to_string());
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn json_error_includes_code_and_details() {
    let err = Error::DuplicateTask("a".to_string());
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert!(json.message.contains("Task already exists"));
    assert_eq!(json.kind, "user_error");
    assert_eq!(json.details, Some(serde_json::json!({ "id": "a" })));

    let io = Error::Io(std::io::Error::other("disk"));
    assert!(JsonError::from(&io).details.is_none());
}
