/// Phase of a [`DataSlot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
  /// No call has completed and none is running
  Idle,
  /// At least one call is outstanding
  Loading,
  /// The last completed call succeeded
  Success,
  /// The last completed call failed
  Failed,
}

/// The single `{data, error, loading}` triple owned by a controller.
///
/// `loading` is tracked as a count of outstanding calls so overlapping
/// loads and saves keep it set until the last one finishes.
#[derive(Debug, Clone)]
pub struct DataSlot<T> {
  data: Option<T>,
  error: Option<String>,
  in_flight: usize,
  completed: bool,
}

impl<T> Default for DataSlot<T> {
  fn default() -> Self {
    Self::new(None)
  }
}

impl<T> DataSlot<T> {
  pub fn new(initial: Option<T>) -> Self {
    Self {
      data: initial,
      error: None,
      in_flight: 0,
      completed: false,
    }
  }

  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn is_loading(&self) -> bool {
    self.in_flight > 0
  }

  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }

  /// Number of calls started but not yet completed.
  pub fn in_flight(&self) -> usize {
    self.in_flight
  }

  pub fn state(&self) -> SlotState {
    if self.is_loading() {
      SlotState::Loading
    } else if self.error.is_some() {
      SlotState::Failed
    } else if self.completed {
      SlotState::Success
    } else {
      SlotState::Idle
    }
  }

  /// A call started: previous error is discarded.
  pub(crate) fn begin(&mut self) {
    self.error = None;
    self.in_flight += 1;
  }

  pub(crate) fn succeed(&mut self, data: T) {
    self.data = Some(data);
    self.error = None;
    self.finish();
  }

  /// Record a failure. Existing data is kept.
  pub(crate) fn fail(&mut self, error: String) {
    self.error = Some(error);
    self.finish();
  }

  /// Local edit with no remote call involved.
  pub(crate) fn set_data(&mut self, data: T) {
    self.data = Some(data);
  }

  fn finish(&mut self) {
    self.in_flight = self.in_flight.saturating_sub(1);
    self.completed = true;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_lifecycle() {
    let mut slot: DataSlot<i32> = DataSlot::default();
    assert_eq!(slot.state(), SlotState::Idle);

    slot.begin();
    assert_eq!(slot.state(), SlotState::Loading);

    slot.succeed(42);
    assert_eq!(slot.state(), SlotState::Success);
    assert_eq!(slot.data(), Some(&42));
  }

  #[test]
  fn test_failure_keeps_data_and_retry_clears_error() {
    let mut slot = DataSlot::new(Some(1));

    slot.begin();
    slot.fail("boom".to_string());
    assert_eq!(slot.state(), SlotState::Failed);
    assert_eq!(slot.error(), Some("boom"));
    assert_eq!(slot.data(), Some(&1));

    slot.begin();
    assert_eq!(slot.error(), None);
    assert!(slot.is_loading());
  }

  #[test]
  fn test_overlapping_calls_stay_loading() {
    let mut slot = DataSlot::new(None);
    slot.begin();
    slot.begin();
    assert_eq!(slot.in_flight(), 2);

    slot.succeed("first");
    assert!(slot.is_loading());

    slot.succeed("second");
    assert!(!slot.is_loading());
    assert_eq!(slot.data(), Some(&"second"));
  }
}
