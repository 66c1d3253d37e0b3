use crate::types::{ItemId, ItemIdError};
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

///
/// IdGenerator
///
/// Per-view monotonic id source. Ids created by one view sort in creation
/// order, which keeps kind collections and rebuilt derived sets stable.
///

#[derive(Debug, Default)]
pub struct IdGenerator {
    previous: Option<ItemId>,
}

impl IdGenerator {
    #[must_use]
    pub const fn new() -> Self {
        Self { previous: None }
    }

    /// Monotonic id generation; increments within the same millisecond.
    pub fn generate(&mut self) -> Result<ItemId, ItemIdError> {
        let ts = now_millis();

        if let Some(previous) = self.previous {
            // maybe time went backward, or it is the same ms.
            // increment instead of drawing new randomness so ids stay monotonic
            if ts <= previous.timestamp_ms() {
                let next = previous
                    .increment()
                    .ok_or(ItemIdError::GeneratorOverflow)?;
                self.previous = Some(next);

                return Ok(next);
            }
        }

        // keep the top random bits clear so increments have headroom
        let random = Ulid::new().random() >> 1;
        let id = ItemId::from_parts(ts, random);
        self.previous = Some(id);

        Ok(id)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
}

///
/// TESTS
///
