use chrono::{NaiveDate, NaiveDateTime};
use rateplan_common::SpanError;
use thiserror::Error;

/// Coarse classification of a [`LedgerError`].
///
/// Callers that only care about *why* an operation did nothing match on
/// this instead of on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected rejection: nothing was mutated and the caller may try again
    /// with different input.
    ValidationRejected,
    /// The operation makes no sense for the given arguments or state.
    IllegalArgument,
    NotFound,
    Config,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Owner not found: {id}")]
    OwnerNotFound { id: String },

    #[error("Counterpart not found: {id}")]
    CounterpartNotFound { id: String },

    #[error("Record not found: {id}")]
    RecordNotFound { id: String },

    #[error("{owner} is not available for {start}..{end}")]
    Unavailable {
        owner: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Base rate {rate} is outside 0..={max}")]
    BaseRateOutOfRange { rate: String, max: String },

    #[error("Invalid span: {0}")]
    InvalidSpan(#[from] SpanError),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Record {id} is already closed")]
    RecordAlreadyClosed { id: String },

    #[error("Record {id} is not a stay")]
    NotAStay { id: String },

    #[error("Course not found: {id}")]
    CourseNotFound { id: String },

    #[error("Student not found: {id}")]
    StudentNotFound { id: String },

    #[error("No seats available in {course}")]
    NoSeatsAvailable { course: String },

    #[error("Rating {score} is outside {min}..={max}")]
    RatingOutOfRange { score: u8, min: u8, max: u8 },

    #[error("Course {course} has already started")]
    CourseAlreadyStarted { course: String },

    #[error("Station not found: {id}")]
    StationNotFound { id: String },

    #[error("Rider not found: {id}")]
    RiderNotFound { id: String },

    #[error("Ride not found: {id}")]
    RideNotFound { id: String },

    #[error("Station {station} has no free docks")]
    StationFull { station: String },

    #[error("Bike {bike} is not docked at {station}")]
    BikeNotDocked { bike: String, station: String },

    #[error("Ride {id} is already finished")]
    RideAlreadyFinished { id: String },

    #[error("Ride cannot end at {returned_at} before it started at {started_at}")]
    InvalidRideWindow {
        started_at: NaiveDateTime,
        returned_at: NaiveDateTime,
    },

    #[error("Train not found: {id}")]
    TrainNotFound { id: String },

    #[error("Maintenance plan not found: {id}")]
    PlanNotFound { id: String },

    #[error("Maintenance task not found: {id}")]
    TaskNotFound { id: String },

    #[error("Train model not found: {name}")]
    ModelNotFound { name: String },

    #[error("Client not found: {id}")]
    ClientNotFound { id: String },

    #[error("Project not found: {id}")]
    ProjectNotFound { id: String },

    #[error("Freelancer not found: {id}")]
    FreelancerNotFound { id: String },

    #[error("Bid {bid} does not belong to project {project}")]
    BidNotOnProject { bid: String, project: String },

    #[error("Project {project} has no awarded bid")]
    NoAwardedBid { project: String },

    #[error("Completion score {score} is outside {min}..={max}")]
    ScoreOutOfRange { score: u32, min: u32, max: u32 },

    #[error("Project {project} is already completed")]
    ProjectAlreadyCompleted { project: String },

    #[error("Board not found: {id}")]
    BoardNotFound { id: String },

    #[error("Person not found: {id}")]
    PersonNotFound { id: String },

    #[error("Unknown task kind '{tag}', expected 'design' or 'programming'")]
    UnknownTaskKind { tag: String },

    #[error("Task {task} is already closed")]
    TaskAlreadyClosed { task: String },

    #[error("Task {task} is not on board {board}")]
    TaskNotOnBoard { task: String, board: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Scenario error: {message}")]
    Scenario { message: String },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            OwnerNotFound { .. }
            | CounterpartNotFound { .. }
            | RecordNotFound { .. }
            | CourseNotFound { .. }
            | StudentNotFound { .. }
            | StationNotFound { .. }
            | RiderNotFound { .. }
            | RideNotFound { .. }
            | TrainNotFound { .. }
            | PlanNotFound { .. }
            | TaskNotFound { .. }
            | ModelNotFound { .. }
            | ClientNotFound { .. }
            | ProjectNotFound { .. }
            | FreelancerNotFound { .. }
            | BoardNotFound { .. }
            | PersonNotFound { .. } => ErrorKind::NotFound,

            Unavailable { .. }
            | NoSeatsAvailable { .. }
            | RatingOutOfRange { .. }
            | StationFull { .. }
            | BikeNotDocked { .. } => ErrorKind::ValidationRejected,

            InvalidSpan(_)
            | BaseRateOutOfRange { .. }
            | InvalidStateTransition { .. }
            | RecordAlreadyClosed { .. }
            | NotAStay { .. }
            | CourseAlreadyStarted { .. }
            | RideAlreadyFinished { .. }
            | InvalidRideWindow { .. }
            | BidNotOnProject { .. }
            | NoAwardedBid { .. }
            | ScoreOutOfRange { .. }
            | ProjectAlreadyCompleted { .. }
            | UnknownTaskKind { .. }
            | TaskAlreadyClosed { .. }
            | TaskNotOnBoard { .. } => ErrorKind::IllegalArgument,

            Config { .. } | Scenario { .. } => ErrorKind::Config,
        }
    }

    pub fn is_rejection(&self) -> bool {
        self.kind() == ErrorKind::ValidationRejected
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
