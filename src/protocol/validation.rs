//! Input validation shared by the HTTP boundary and the message router.

/// Room names must be 3..=50 characters after trimming.
pub const MIN_ROOM_NAME_LEN: usize = 3;
pub const MAX_ROOM_NAME_LEN: usize = 50;

pub fn validate_room_name(name: &str) -> Result<String, String> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if len < MIN_ROOM_NAME_LEN {
        return Err(format!(
            "Room name too short (min {MIN_ROOM_NAME_LEN} characters)"
        ));
    }
    if len > MAX_ROOM_NAME_LEN {
        return Err(format!(
            "Room name too long (max {MAX_ROOM_NAME_LEN} characters)"
        ));
    }
    Ok(trimmed.to_string())
}

/// An answer sheet may only reference the round's categories.
pub fn validate_answer_categories(
    answers: &std::collections::HashMap<String, String>,
    categories: &[String],
) -> Result<(), String> {
    for key in answers.keys() {
        if !categories.iter().any(|c| c == key) {
            return Err(format!("Unknown category \"{key}\""));
        }
    }
    Ok(())
}
