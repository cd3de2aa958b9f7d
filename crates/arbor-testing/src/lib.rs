//! Testing utilities and harness for Arbor

pub mod host;
pub mod root;
pub mod widgets;

pub use host::{HostOp, TestHost};
pub use root::{path, run_test_root, RecordedCommand, TestRoot};
pub use widgets::{keyed_stack, label, stack, text, Label, LabelNode, Stack, StackNode};

pub mod prelude {
    pub use crate::host::*;
    pub use crate::root::*;
    pub use crate::widgets::*;
}
