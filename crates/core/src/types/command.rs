//! Terminal commands and input validation

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::protocol::FIELD_SEPARATOR;

/// Smallest accepted sale amount
pub const MIN_SALE_AMOUNT: i64 = 50;
/// Largest accepted sale amount
pub const MAX_SALE_AMOUNT: i64 = 999_999_999;
/// Largest accepted refund operation number
pub const MAX_OPERATION_NUMBER: i64 = 999_999;
/// Ticket number sent with every sale
pub const SALE_TICKET_NUMBER: &str = "123456";

/// Four-digit opcode, always the first command field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Sale,
    Refund,
    Totals,
    Close,
    Details,
    LastSale,
    LoadKeys,
}

impl Opcode {
    pub fn code(self) -> &'static str {
        match self {
            Opcode::Sale => "0200",
            Opcode::Refund => "1200",
            Opcode::Totals => "0700",
            Opcode::Close => "0500",
            Opcode::Details => "0260",
            Opcode::LastSale => "0250",
            Opcode::LoadKeys => "0800",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "0200" => Some(Opcode::Sale),
            "1200" => Some(Opcode::Refund),
            "0700" => Some(Opcode::Totals),
            "0500" => Some(Opcode::Close),
            "0260" => Some(Opcode::Details),
            "0250" => Some(Opcode::LastSale),
            "0800" => Some(Opcode::LoadKeys),
            _ => None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How the refund operation number is bounds-checked
///
/// `Literal` reproduces the deployed app, which rejects every positive
/// operation number. `Corrected` accepts `1..=999999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundCheck {
    #[default]
    Literal,
    Corrected,
}

/// A validated terminal command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PosCommand {
    LoadKeys,
    LastSale,
    Totals,
    Close,
    Details,
    Sale { amount: i64 },
    Refund { operation_number: i64 },
}

impl PosCommand {
    /// Build a sale from operator input
    ///
    /// # Errors
    /// `ValidationError` unless the input is an integer in `50..=999999999`.
    pub fn sale(input: &str) -> Result<Self, ValidationError> {
        let amount = parse_integer(input).ok_or_else(|| ValidationError::AmountNotNumeric {
            input: input.to_string(),
        })?;

        if amount < MIN_SALE_AMOUNT {
            return Err(ValidationError::AmountTooLow { amount });
        }
        if amount > MAX_SALE_AMOUNT {
            return Err(ValidationError::AmountTooHigh { amount });
        }

        Ok(PosCommand::Sale { amount })
    }

    /// Build a refund from operator input
    pub fn refund(input: &str, check: RefundCheck) -> Result<Self, ValidationError> {
        let operation_number =
            parse_integer(input).ok_or_else(|| ValidationError::OperationNumberNotNumeric {
                input: input.to_string(),
            })?;

        let rejects_sign = match check {
            RefundCheck::Literal => operation_number > 0,
            RefundCheck::Corrected => operation_number <= 0,
        };
        if rejects_sign {
            return Err(ValidationError::OperationNumberNotPositive { operation_number });
        }
        if operation_number > MAX_OPERATION_NUMBER {
            return Err(ValidationError::OperationNumberTooHigh { operation_number });
        }

        Ok(PosCommand::Refund { operation_number })
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            PosCommand::LoadKeys => Opcode::LoadKeys,
            PosCommand::LastSale => Opcode::LastSale,
            PosCommand::Totals => Opcode::Totals,
            PosCommand::Close => Opcode::Close,
            PosCommand::Details => Opcode::Details,
            PosCommand::Sale { .. } => Opcode::Sale,
            PosCommand::Refund { .. } => Opcode::Refund,
        }
    }

    /// Command body as sent inside the frame
    pub fn body(&self) -> String {
        let op = self.opcode().code();
        let fields: Vec<String> = match self {
            PosCommand::LoadKeys => vec![op.into()],
            PosCommand::LastSale => vec![op.into(), "0".into()],
            PosCommand::Totals => vec![op.into(), String::new(), String::new()],
            PosCommand::Close => vec![op.into(), "0".into()],
            PosCommand::Details => vec![op.into(), "1".into()],
            PosCommand::Sale { amount } => vec![
                op.into(),
                amount.to_string(),
                SALE_TICKET_NUMBER.into(),
                String::new(),
                String::new(),
                "0".into(),
            ],
            PosCommand::Refund { operation_number } => {
                vec![op.into(), operation_number.to_string(), String::new()]
            }
        };
        fields.join(&FIELD_SEPARATOR.to_string())
    }
}

impl fmt::Display for PosCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body())
    }
}

fn parse_integer(input: &str) -> Option<i64> {
    input.trim().parse::<i64>().ok()
}
