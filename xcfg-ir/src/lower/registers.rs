use crate::ir::Value;
use xcfg_common::{Register, BLOCK_PARAM_COUNT};

/// Current SSA value of every tracked register inside the block being lowered
#[derive(Debug, Clone)]
pub struct RegisterTracker {
    values: [Value; BLOCK_PARAM_COUNT],
}

impl Default for RegisterTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterTracker {
    pub fn new() -> Self {
        Self {
            values: [Value(0); BLOCK_PARAM_COUNT],
        }
    }

    /// Replace every entry with a block's input parameters (canonical order)
    pub fn reset(&mut self, inputs: &[Value]) {
        for (slot, value) in self.values.iter_mut().zip(inputs) {
            *slot = *value;
        }
    }

    pub fn read(&self, reg: Register) -> Value {
        self.values[reg.index()]
    }

    pub fn write(&mut self, reg: Register, value: Value) {
        self.values[reg.index()] = value;
    }

    /// All 17 current values in canonical order
    pub fn snapshot(&self) -> Vec<Value> {
        self.values.to_vec()
    }
}
