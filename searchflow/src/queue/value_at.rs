use crate::types::NanoTime;
use derive_new::new;

/// A value paired with the engine time it was emitted or is due.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, new)]
pub struct ValueAt<T> {
    pub value: T,
    pub time: NanoTime,
}
