//! dispatch-prep
//!
//! Input and output preparation for an appointment-dispatch optimizer.
//! [`assembler::assemble`] turns appointment, competency and duration rows
//! plus raw travel matrices into the optimizer's scheduling document;
//! [`result::AssignmentResult`] decodes the optimizer's answer, and
//! [`capacity::analyze`] and [`travel::technician_travel`] measure it against
//! that document.

pub mod assembler;
pub mod business_unit;
pub mod capacity;
pub mod config;
pub mod coordinate;
pub mod document;
pub mod error;
pub mod haversine;
pub mod logging;
pub mod matrix;
pub mod osrm;
pub mod result;
pub mod rules;
pub mod source;
pub mod time_window;
pub mod traits;
pub mod travel;
