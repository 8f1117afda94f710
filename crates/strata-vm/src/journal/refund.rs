use crate::error::VmError;
use crate::snapshot::Controllable;

/// Gas refund counter kept as a history stack.
///
/// Every mutation pushes the new value; the current value is the top of the
/// stack (0 when empty).
#[derive(Debug, Default, Clone)]
pub struct Refund {
    journal: Vec<u64>,
}

impl Refund {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_refund(&mut self, gas: u64) {
        let next = self.get_refund().saturating_add(gas);
        self.journal.push(next);
    }

    /// Subtract from the counter.
    ///
    /// # Errors
    /// Returns `RefundUnderflow` and records nothing if `gas` exceeds the
    /// current value.
    pub fn sub_refund(&mut self, gas: u64) -> Result<(), VmError> {
        let current = self.get_refund();
        let next = current
            .checked_sub(gas)
            .ok_or(VmError::RefundUnderflow { current, amount: gas })?;
        self.journal.push(next);
        Ok(())
    }

    pub fn get_refund(&self) -> u64 {
        self.journal.last().copied().unwrap_or(0)
    }
}

impl Controllable for Refund {
    fn registry_key(&self) -> &'static str {
        "refund"
    }

    fn snapshot(&mut self) -> usize {
        self.journal.len()
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        self.journal.truncate(id);
    }

    fn finalize(&mut self) {
        self.journal.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sub() {
        let mut refund = Refund::new();
        assert_eq!(refund.get_refund(), 0);
        refund.add_refund(1);
        refund.add_refund(2);
        assert_eq!(refund.get_refund(), 3);
        refund.sub_refund(1).unwrap();
        assert_eq!(refund.get_refund(), 2);
    }

    #[test]
    fn test_revert() {
        let mut refund = Refund::new();
        refund.add_refund(5);
        let snap = refund.snapshot();
        refund.add_refund(10);
        refund.sub_refund(3).unwrap();
        assert_eq!(refund.get_refund(), 12);
        refund.revert_to_snapshot(snap);
        assert_eq!(refund.get_refund(), 5);
    }

    #[test]
    fn test_underflow_is_rejected() {
        let mut refund = Refund::new();
        refund.add_refund(2);
        assert_eq!(
            refund.sub_refund(3),
            Err(VmError::RefundUnderflow { current: 2, amount: 3 })
        );
        assert_eq!(refund.get_refund(), 2);
    }

    #[test]
    fn test_finalize_resets_to_zero() {
        let mut refund = Refund::new();
        refund.add_refund(7);
        refund.finalize();
        assert_eq!(refund.get_refund(), 0);
    }
}
