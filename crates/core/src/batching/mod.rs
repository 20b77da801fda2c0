//! Request batching
//!
//! A [`Batch`] defers the `send` moment of every queryable bound to it, then
//! ships all of them in one combined request on [`Batch::execute`]. Each
//! caller's execution settles in registration order, whatever order the wire
//! format returns responses in.
//!
//! ```text
//! Open --execute()--> Executing --> Closed
//! ```
//!
//! Registration happens in `init`, so it follows invocation order. Invoking a
//! bound queryable once the batch left `Open` fails with `BatchClosed`.

pub mod batch;
pub mod codec;

pub use batch::{Batch, BatchBinding, BatchState};
pub use codec::{BatchCodec, BatchRequest, BatchSegment};
