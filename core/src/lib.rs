//! # Courtside Core
//!
//! Core traits and types shared by the Courtside crates.
//!
//! Domain logic is written as reducers: a command is validated against the
//! current state, turned into one or more events, and those events are applied
//! to the state in place. The shell around a reducer (loading, saving, retrying)
//! lives in the domain crate and uses the versioning and retry helpers exported
//! here.
//!
//! ## Core Concepts
//!
//! - **State**: the aggregate a reducer mutates (one occurrence roster, for example)
//! - **Action**: a command describing an intent
//! - **Event**: a fact produced by a successful command
//! - **Environment**: injected dependencies such as the [`environment::Clock`]
//!
//! ## Example
//!
//! ```ignore
//! use courtside_core::{reducer::Reducer, SmallVec, smallvec};
//!
//! impl Reducer for CounterReducer {
//!     type State = Counter;
//!     type Action = CounterCommand;
//!     type Event = CounterEvent;
//!     type Error = CounterError;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Counter,
//!         action: CounterCommand,
//!         _env: &(),
//!     ) -> Result<SmallVec<[CounterEvent; 4]>, CounterError> {
//!         state.value += 1;
//!         Ok(smallvec![CounterEvent::Incremented])
//!     }
//! }
//! ```

pub mod retry;
pub mod version;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Reducer module - The core trait for business logic
///
/// Reducers are pure with respect to I/O: `(State, Action, Environment) → (State', Events)`.
/// A rejected command returns an error and must leave the state untouched.
pub mod reducer {
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The aggregate this reducer operates on
    /// - `Action`: The command type this reducer processes
    /// - `Event`: The facts emitted when a command succeeds
    /// - `Error`: Why a command was rejected
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The command type this reducer processes
        type Action;

        /// Events emitted by successful commands
        type Event;

        /// Rejection reasons
        type Error;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce a command into state changes and the events describing them
        ///
        /// Implementations:
        /// 1. Validate the command against `state`
        /// 2. Build the resulting events
        /// 3. Apply those events to `state`
        ///
        /// An empty event list means the command was accepted but changed nothing.
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the command is rejected. `state` is left as it was.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Self::Event; 4]>, Self::Error>;
    }
}

/// Environment module - Dependency injection traits
///
/// External dependencies are abstracted behind traits and injected
/// via the reducer's Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use courtside_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
