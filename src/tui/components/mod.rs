//! # TUI Components
//!
//! ## Stateless Components (Props-Based Rendering)
//!
//! Receive all data as struct fields and are rebuilt every frame:
//! - `InputBox`: the password field
//! - `Gate`: banner, field, hint and failure notice
//!
//! ## Stateful Components (Event-Driven)
//!
//! - `CvPage`: scrollable CV; its `CvPageState` handles scroll events and
//!   lives for the whole session
//!
//! ```text
//! components/
//! ├── mod.rs        (this file)
//! ├── input_box.rs  (password field)
//! ├── gate.rs       (unauthenticated screen)
//! └── cv_page.rs    (authenticated screen)
//! ```

pub mod cv_page;
pub mod gate;
pub mod input_box;

pub use cv_page::{CvPage, CvPageState};
pub use gate::Gate;
pub use input_box::InputBox;
