// Domain models shared by the reconciler, aligner and HTTP/WS layer

mod control;
mod series;
mod telemetry;
mod variable;

pub use control::{ActuatorCommand, ControlMode, DeviceControlState};
pub use series::{AlignedRow, RawSeriesPoint, SeriesPoint, SeriesTime};
pub use telemetry::{
    DeviceStatus, SdataPayload, TelemetryEntry, TelemetryEvent, TelemetryMessage, TelemetryValue,
};
pub use variable::{TEMP_CODE, TIME_COLUMN, Variable, VariableMap};
