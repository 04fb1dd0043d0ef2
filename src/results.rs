use crate::types::{CaptureResult, SnapError};

/// Fixed-length, input-ordered container with one write-once slot per URL.
///
/// Slot `serial - 1` belongs to the worker for `serial`, so writes never
/// overlap. Reading happens only through [`ResultSet::finish`], after the
/// batch has been joined.
#[derive(Debug)]
pub struct ResultSet {
    urls: Vec<String>,
    slots: Vec<Option<CaptureResult>>,
}

impl ResultSet {
    pub fn new(urls: &[String]) -> Self {
        ResultSet {
            urls: urls.to_vec(),
            slots: vec![None; urls.len()],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn fill(&mut self, result: CaptureResult) -> Result<(), SnapError> {
        let len = self.slots.len();
        let slot = result
            .serial
            .checked_sub(1)
            .and_then(|i| self.slots.get_mut(i))
            .ok_or(SnapError::SlotOutOfRange {
                serial: result.serial,
                len,
            })?;
        if slot.is_some() {
            return Err(SnapError::SlotAlreadyFilled(result.serial));
        }
        *slot = Some(result);
        Ok(())
    }

    /// Hands out the results in input order.
    ///
    /// A slot nobody wrote (its worker died) comes back as the empty result
    /// for that serial, so the set always has one entry per input URL.
    pub fn finish(self) -> Vec<CaptureResult> {
        self.slots
            .into_iter()
            .zip(self.urls)
            .enumerate()
            .map(|(i, (slot, url))| {
                slot.unwrap_or_else(|| {
                    warn!("[{}] no result recorded for {}", i + 1, url);
                    CaptureResult::empty(i + 1, &url)
                })
            })
            .collect()
    }
}
