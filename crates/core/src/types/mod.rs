//! Domain types for terminal control

mod command;
mod event;
mod response;

pub use command::{
    Opcode, PosCommand, RefundCheck, MAX_OPERATION_NUMBER, MAX_SALE_AMOUNT, MIN_SALE_AMOUNT,
    SALE_TICKET_NUMBER,
};
pub use event::{Severity, TransportEvent};
pub use response::TerminalResponse;
