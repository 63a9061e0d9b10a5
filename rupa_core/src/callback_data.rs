//! Inline button payloads. Keyword payloads are matched before the
//! `<code>_<recordId>` form so that tokens containing `_` never reach the
//! numeric parser.

use std::fmt;
use std::str::FromStr;

use crate::error::RupaError;
use crate::merge::batch::Direction;
use crate::selection::Service;
use crate::transform::Action;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackData {
    StartBot,
    MainMenu,
    Service(Service),
    Action { action: Action, record_id: u64 },
    YesMore,
    NoThanks,
    MergeMove { index: usize, direction: Direction },
    MergeRemove { index: usize },
    ExecuteMerge,
    CancelMerge,
}

impl fmt::Display for CallbackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackData::StartBot => f.write_str("start_bot"),
            CallbackData::MainMenu => f.write_str("main_menu"),
            CallbackData::Service(service) => write!(f, "svc_{}", service.token()),
            CallbackData::Action { action, record_id } => {
                write!(f, "{}_{}", action.code(), record_id)
            }
            CallbackData::YesMore => f.write_str("yes_more"),
            CallbackData::NoThanks => f.write_str("no_thanks"),
            CallbackData::MergeMove {
                index,
                direction: Direction::Up,
            } => write!(f, "merge_up_{}", index),
            CallbackData::MergeMove {
                index,
                direction: Direction::Down,
            } => write!(f, "merge_down_{}", index),
            CallbackData::MergeRemove { index } => write!(f, "merge_rm_{}", index),
            CallbackData::ExecuteMerge => f.write_str("execute_pdf_merge"),
            CallbackData::CancelMerge => f.write_str("cancel_pdf_merge"),
        }
    }
}

impl FromStr for CallbackData {
    type Err = RupaError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let invalid = || RupaError::InvalidCallback(data.to_string());

        match data {
            "start_bot" => return Ok(CallbackData::StartBot),
            "main_menu" => return Ok(CallbackData::MainMenu),
            "yes_more" => return Ok(CallbackData::YesMore),
            "no_thanks" => return Ok(CallbackData::NoThanks),
            "execute_pdf_merge" => return Ok(CallbackData::ExecuteMerge),
            "cancel_pdf_merge" => return Ok(CallbackData::CancelMerge),
            _ => {}
        }

        if let Some(token) = data.strip_prefix("svc_") {
            return Service::from_token(token)
                .map(CallbackData::Service)
                .ok_or_else(invalid);
        }
        if let Some(index) = data.strip_prefix("merge_up_") {
            let index = index.parse().map_err(|_| invalid())?;
            return Ok(CallbackData::MergeMove {
                index,
                direction: Direction::Up,
            });
        }
        if let Some(index) = data.strip_prefix("merge_down_") {
            let index = index.parse().map_err(|_| invalid())?;
            return Ok(CallbackData::MergeMove {
                index,
                direction: Direction::Down,
            });
        }
        if let Some(index) = data.strip_prefix("merge_rm_") {
            let index = index.parse().map_err(|_| invalid())?;
            return Ok(CallbackData::MergeRemove { index });
        }

        let (code, record_id) = data.split_once('_').ok_or_else(invalid)?;
        let action = code
            .parse::<u8>()
            .ok()
            .and_then(Action::from_code)
            .ok_or_else(invalid)?;
        let record_id = record_id.parse::<u64>().map_err(|_| invalid())?;
        Ok(CallbackData::Action { action, record_id })
    }
}
