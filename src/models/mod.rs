pub mod performance;
pub mod remote;
pub mod session;
pub mod sync;

pub use performance::{NewPerformanceLog, PerformanceLog, Reps, ValidationError};
pub use remote::{
  AlternativeExercise, CompletionSummary, Difficulty, Exercise, Frequency, Goal, NewWorkoutLogRow,
  ProfileUpdate, Routine, RoutineExercise, TodaysWorkout, UserProfile, UserRoutine, WorkoutLogRow,
};
pub use session::{CompletedExercises, SessionStatus, StoredSession, WorkoutSession};
pub use sync::{SyncOutcome, SyncStatus, UploadReport};
