//! Course identification and building sequences for block assemblies.
//!
//! Works on an [`Assembly`](block_assembly::Assembly) whose interfaces have
//! been detected:
//!
//! - [`assign_courses`] layers the blocks by contact distance from the supports
//! - [`building_sequence`] lists the blocks to place before a given block
//! - [`placing_frame`] gives the frame to place a block by
//!
//! # Example
//!
//! ```no_run
//! use assembly_sequence::{assign_courses, building_sequence};
//! use block_assembly::{Assembly, InterfaceParams};
//!
//! let mut wall = Assembly::load("wall.json").unwrap();
//! wall.detect_interfaces(&InterfaceParams::default()).unwrap();
//! assign_courses(&mut wall);
//!
//! let sequence = building_sequence(&wall, 12).unwrap();
//! println!("place {:?}", sequence);
//! ```

mod error;

pub mod courses;
pub mod sequence;

pub use courses::{assembly_courses, assign_courses, contact_neighbors, course_of, COURSE_ATTRIBUTE};
pub use error::{SequenceError, SequenceResult};
pub use sequence::{building_sequence, placing_frame};
