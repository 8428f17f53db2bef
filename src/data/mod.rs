/// Data layer: turns CSV or WAV input into SRAM register values.
///
/// Architecture:
/// ```text
///  .csv                    .wav
///    │                       │
///    ▼                       ▼
///  ┌──────────┐        ┌──────────┐
///  │ tabular  │        │  audio   │   bytes → one channel per column/channel
///  └──────────┘        └──────────┘
///         │  filter: row window │
///         └─────────┬───────────┘
///                   ▼
///            ┌────────────┐
///            │  combine   │   range-normalize + weighted sum → [-1, 1]
///            └────────────┘
///                   │
///                   ▼
///            ┌────────────┐
///            │   scale    │   pad → auto-scale/multiplier → quantize
///            └────────────┘
///                   │
///                   ▼
///          Vec<RegisterValue>
/// ```

pub mod audio;
pub mod combine;
pub mod filter;
pub mod loader;
pub mod model;
pub mod scale;
pub mod tabular;
