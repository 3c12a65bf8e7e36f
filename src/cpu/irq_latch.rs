/// Two-phase latch between the interrupt controller's request line and the CPU.
///
/// A request first seen at an instruction boundary must survive one complete
/// instruction before it may be acknowledged.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum IrqLatch {
    Idle,
    /// seen at the top of the current iteration
    Pending,
    /// a full instruction elapsed since the request was seen
    Waited,
}

impl Default for IrqLatch {
    fn default() -> Self {
        IrqLatch::Idle
    }
}

impl IrqLatch {
    /// samples the request line at the top of an iteration.
    /// returns true if the request may be delivered now
    pub fn sample(&mut self, line: bool) -> bool {
        if !line {
            *self = IrqLatch::Idle;
            return false;
        }
        match *self {
            IrqLatch::Idle => {
                *self = IrqLatch::Pending;
                false
            }
            IrqLatch::Pending => false,
            IrqLatch::Waited => true,
        }
    }

    /// called at the end of an iteration
    pub fn instruction_retired(&mut self) {
        if *self == IrqLatch::Pending {
            *self = IrqLatch::Waited;
        }
    }

    pub fn delivered(&mut self) {
        *self = IrqLatch::Idle;
    }
}
