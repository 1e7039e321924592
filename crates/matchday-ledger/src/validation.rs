use matchday_types::{
    clock::parse_display_time,
    config::LedgerConfig,
    ledger::{Goal, MatchEvent},
    MatchdayError, Result,
};

pub fn validation_error(message: impl Into<String>) -> MatchdayError {
    MatchdayError::Validation(message.into())
}

fn check_time(raw_time: u32, display_time: &str, limits: &LedgerConfig) -> Result<()> {
    if raw_time > limits.max_raw_time_secs {
        return Err(validation_error(format!(
            "time {raw_time}s is outside [0, {}]",
            limits.max_raw_time_secs
        )));
    }
    match parse_display_time(display_time) {
        Some(seconds) if seconds == u64::from(raw_time) => Ok(()),
        Some(_) => Err(validation_error(format!(
            "display time '{display_time}' does not match {raw_time}s"
        ))),
        None => Err(validation_error(format!(
            "display time '{display_time}' is not MM:SS"
        ))),
    }
}

fn check_shirt(number: Option<u8>, what: &str) -> Result<()> {
    match number {
        Some(n) if !(1..=99).contains(&n) => Err(validation_error(format!(
            "{what} shirt number {n} is outside 1-99"
        ))),
        _ => Ok(()),
    }
}

pub fn validate_goal(goal: &Goal, limits: &LedgerConfig) -> Result<()> {
    check_time(goal.raw_time, &goal.display_time, limits)?;
    if goal.scorer_name.trim().is_empty() {
        return Err(validation_error("scorer name is required"));
    }
    if goal.team_name.trim().is_empty() {
        return Err(validation_error("team name is required"));
    }
    check_shirt(goal.scorer_shirt_number, "scorer")?;
    check_shirt(goal.assist_shirt_number, "assist")?;
    if goal.assist_shirt_number.is_some() && goal.assist_name.is_none() {
        return Err(validation_error("assist shirt number given without an assist"));
    }
    let has_reason = goal
        .disallowed_reason
        .as_deref()
        .map(|reason| !reason.trim().is_empty())
        .unwrap_or(false);
    if goal.disallowed != has_reason {
        return Err(MatchdayError::Invariant(
            "a goal is disallowed exactly when it carries a reason".into(),
        ));
    }
    Ok(())
}

pub fn validate_event(event: &MatchEvent, limits: &LedgerConfig) -> Result<()> {
    check_time(event.raw_time, &event.display_time, limits)?;
    let notes_len = event.notes.chars().count();
    if notes_len > limits.max_notes_len {
        return Err(validation_error(format!(
            "notes are {notes_len} characters, limit is {}",
            limits.max_notes_len
        )));
    }
    if event.event_type.is_phase_marker() != event.is_system_event {
        return Err(validation_error(format!(
            "'{}' events {} system events",
            event.event_type,
            if event.event_type.is_phase_marker() {
                "must be"
            } else {
                "cannot be"
            }
        )));
    }
    if event.is_system_event
        && event
            .score
            .as_deref()
            .map(|score| score.trim().is_empty())
            .unwrap_or(true)
    {
        return Err(validation_error("system events must carry a score snapshot"));
    }
    if let Some(name) = &event.team_name {
        if name.trim().is_empty() {
            return Err(validation_error("team name must not be blank"));
        }
    }
    Ok(())
}
