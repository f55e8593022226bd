use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use crate::utils::exercise::{normalize_exercise_name, normalize_muscle_groups, normalize_notes, collapse_whitespace};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSet {
    pub reps: u32,
    pub weight_kg: Option<f64>,
    pub rest_seconds: Option<u32>,
}

impl Default for ExerciseSet {
    fn default() -> Self {
        Self {
            reps: 10,
            weight_kg: None,
            rest_seconds: Some(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    #[serde(default)]
    pub muscle_groups: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub sets: Vec<ExerciseSet>,
}

impl Exercise {
    /// New exercises always start with one set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            muscle_groups: Vec::new(),
            notes: None,
            sets: vec![ExerciseSet::default()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDay {
    pub name: String,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

/// Days, exercises and sets of a training plan, stored as JSONB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingPlanDocument {
    #[serde(default)]
    pub days: Vec<TrainingDay>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanEditError {
    #[error("Day {0} does not exist")]
    DayOutOfRange(usize),
    #[error("Exercise {1} does not exist on day {0}")]
    ExerciseOutOfRange(usize, usize),
    #[error("Set {2} does not exist for exercise {1} on day {0}")]
    SetOutOfRange(usize, usize, usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanValidationError {
    #[error("Plan title is required")]
    MissingTitle,
    #[error("Plan must contain at least one day")]
    NoDays,
    #[error("Day {0} needs a name")]
    UnnamedDay(usize),
    #[error("Exercise {1} on day {0} needs a name")]
    UnnamedExercise(usize, usize),
    #[error("Exercise {1} on day {0} needs at least one set")]
    NoSets(usize, usize),
    #[error("Set {2} of exercise {1} on day {0} must have a positive rep count")]
    InvalidReps(usize, usize, usize),
    #[error("Set {2} of exercise {1} on day {0} has a negative weight")]
    InvalidWeight(usize, usize, usize),
}

/// Partial update of an exercise's descriptive fields.
#[derive(Debug, Clone, Default)]
pub struct ExerciseChanges {
    pub name: Option<String>,
    pub muscle_groups: Option<Vec<String>>,
    pub notes: Option<String>,
}

/// Partial update of a set.
#[derive(Debug, Clone, Default)]
pub struct SetChanges {
    pub reps: Option<u32>,
    pub weight_kg: Option<f64>,
    pub rest_seconds: Option<u32>,
}

impl TrainingPlanDocument {
    fn day_mut(&mut self, day: usize) -> Result<&mut TrainingDay, PlanEditError> {
        self.days.get_mut(day).ok_or(PlanEditError::DayOutOfRange(day))
    }

    fn exercise_mut(&mut self, day: usize, exercise: usize) -> Result<&mut Exercise, PlanEditError> {
        self.day_mut(day)?
            .exercises
            .get_mut(exercise)
            .ok_or(PlanEditError::ExerciseOutOfRange(day, exercise))
    }

    pub fn add_day(&mut self, name: impl Into<String>) -> usize {
        self.days.push(TrainingDay {
            name: name.into(),
            exercises: Vec::new(),
        });
        self.days.len() - 1
    }

    pub fn remove_day(&mut self, day: usize) -> Result<TrainingDay, PlanEditError> {
        if day >= self.days.len() {
            return Err(PlanEditError::DayOutOfRange(day));
        }
        Ok(self.days.remove(day))
    }

    pub fn rename_day(&mut self, day: usize, name: impl Into<String>) -> Result<(), PlanEditError> {
        self.day_mut(day)?.name = name.into();
        Ok(())
    }

    pub fn add_exercise(&mut self, day: usize, mut exercise: Exercise) -> Result<usize, PlanEditError> {
        if exercise.sets.is_empty() {
            exercise.sets.push(ExerciseSet::default());
        }
        let exercises = &mut self.day_mut(day)?.exercises;
        exercises.push(exercise);
        Ok(exercises.len() - 1)
    }

    pub fn remove_exercise(&mut self, day: usize, exercise: usize) -> Result<Exercise, PlanEditError> {
        let exercises = &mut self.day_mut(day)?.exercises;
        if exercise >= exercises.len() {
            return Err(PlanEditError::ExerciseOutOfRange(day, exercise));
        }
        Ok(exercises.remove(exercise))
    }

    pub fn update_exercise(
        &mut self,
        day: usize,
        exercise: usize,
        changes: ExerciseChanges,
    ) -> Result<(), PlanEditError> {
        let target = self.exercise_mut(day, exercise)?;
        if let Some(name) = changes.name {
            target.name = name;
        }
        if let Some(groups) = changes.muscle_groups {
            target.muscle_groups = groups;
        }
        if let Some(notes) = changes.notes {
            target.notes = Some(notes);
        }
        Ok(())
    }

    /// Appends a copy of the exercise's last set.
    pub fn add_set(&mut self, day: usize, exercise: usize) -> Result<usize, PlanEditError> {
        let sets = &mut self.exercise_mut(day, exercise)?.sets;
        let next = sets.last().cloned().unwrap_or_default();
        sets.push(next);
        Ok(sets.len() - 1)
    }

    /// Removes a set unless it is the exercise's only one. Returns whether a set was removed.
    pub fn remove_set(&mut self, day: usize, exercise: usize, set: usize) -> Result<bool, PlanEditError> {
        let sets = &mut self.exercise_mut(day, exercise)?.sets;
        if set >= sets.len() {
            return Err(PlanEditError::SetOutOfRange(day, exercise, set));
        }
        if sets.len() <= 1 {
            return Ok(false);
        }
        sets.remove(set);
        Ok(true)
    }

    pub fn update_set(
        &mut self,
        day: usize,
        exercise: usize,
        set: usize,
        changes: SetChanges,
    ) -> Result<(), PlanEditError> {
        let target = self
            .exercise_mut(day, exercise)?
            .sets
            .get_mut(set)
            .ok_or(PlanEditError::SetOutOfRange(day, exercise, set))?;
        if let Some(reps) = changes.reps {
            target.reps = reps;
        }
        if let Some(weight) = changes.weight_kg {
            target.weight_kg = Some(weight);
        }
        if let Some(rest) = changes.rest_seconds {
            target.rest_seconds = Some(rest);
        }
        Ok(())
    }

    pub fn apply(&mut self, edit: PlanEdit) -> Result<(), PlanEditError> {
        match edit {
            PlanEdit::AddDay { name } => {
                self.add_day(name);
            }
            PlanEdit::RemoveDay { day } => {
                self.remove_day(day)?;
            }
            PlanEdit::RenameDay { day, name } => self.rename_day(day, name)?,
            PlanEdit::AddExercise { day, name } => {
                self.add_exercise(day, Exercise::new(name))?;
            }
            PlanEdit::RemoveExercise { day, exercise } => {
                self.remove_exercise(day, exercise)?;
            }
            PlanEdit::UpdateExercise { day, exercise, name, muscle_groups, notes } => {
                self.update_exercise(day, exercise, ExerciseChanges { name, muscle_groups, notes })?
            }
            PlanEdit::AddSet { day, exercise } => {
                self.add_set(day, exercise)?;
            }
            PlanEdit::RemoveSet { day, exercise, set } => {
                self.remove_set(day, exercise, set)?;
            }
            PlanEdit::UpdateSet { day, exercise, set, reps, weight_kg, rest_seconds } => {
                self.update_set(day, exercise, set, SetChanges { reps, weight_kg, rest_seconds })?
            }
        }
        Ok(())
    }

    /// Applies edits in order on a copy; the document is unchanged if any edit fails.
    pub fn apply_all(&mut self, edits: Vec<PlanEdit>) -> Result<(), PlanEditError> {
        let mut working = self.clone();
        for edit in edits {
            working.apply(edit)?;
        }
        *self = working;
        Ok(())
    }

    pub fn normalize(&mut self) {
        for day in &mut self.days {
            day.name = collapse_whitespace(&day.name);
            for exercise in &mut day.exercises {
                exercise.name = normalize_exercise_name(&exercise.name);
                exercise.muscle_groups = normalize_muscle_groups(&exercise.muscle_groups);
                exercise.notes = normalize_notes(exercise.notes.as_deref());
            }
        }
    }

    pub fn validate(&self) -> Result<(), PlanValidationError> {
        if self.days.is_empty() {
            return Err(PlanValidationError::NoDays);
        }
        for (d, day) in self.days.iter().enumerate() {
            if day.name.trim().is_empty() {
                return Err(PlanValidationError::UnnamedDay(d));
            }
            for (e, exercise) in day.exercises.iter().enumerate() {
                if exercise.name.trim().is_empty() {
                    return Err(PlanValidationError::UnnamedExercise(d, e));
                }
                if exercise.sets.is_empty() {
                    return Err(PlanValidationError::NoSets(d, e));
                }
                for (s, set) in exercise.sets.iter().enumerate() {
                    if set.reps == 0 {
                        return Err(PlanValidationError::InvalidReps(d, e, s));
                    }
                    if set.weight_kg.is_some_and(|w| w < 0.0 || !w.is_finite()) {
                        return Err(PlanValidationError::InvalidWeight(d, e, s));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn total_sets(&self) -> usize {
        self.days
            .iter()
            .flat_map(|day| &day.exercises)
            .map(|exercise| exercise.sets.len())
            .sum()
    }
}

/// One editing step, as sent by the plan builder.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanEdit {
    AddDay { name: String },
    RemoveDay { day: usize },
    RenameDay { day: usize, name: String },
    AddExercise { day: usize, name: String },
    RemoveExercise { day: usize, exercise: usize },
    UpdateExercise {
        day: usize,
        exercise: usize,
        name: Option<String>,
        muscle_groups: Option<Vec<String>>,
        notes: Option<String>,
    },
    AddSet { day: usize, exercise: usize },
    RemoveSet { day: usize, exercise: usize, set: usize },
    UpdateSet {
        day: usize,
        exercise: usize,
        set: usize,
        reps: Option<u32>,
        weight_kg: Option<f64>,
        rest_seconds: Option<u32>,
    },
}

pub fn validate_title(title: &str) -> Result<String, PlanValidationError> {
    let title = collapse_whitespace(title);
    if title.is_empty() {
        Err(PlanValidationError::MissingTitle)
    } else {
        Ok(title)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrainingPlan {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub plan_data: sqlx::types::Json<TrainingPlanDocument>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssignedTrainingPlan {
    pub id: Uuid,
    pub plan_id: Option<Uuid>,
    pub trainer_id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    pub plan_data: sqlx::types::Json<TrainingPlanDocument>,
    pub status: String,
    pub start_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTrainingPlanRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub plan: TrainingPlanDocument,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTrainingPlanRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub plan: Option<TrainingPlanDocument>,
}

#[derive(Debug, Deserialize)]
pub struct EditTrainingPlanRequest {
    pub edits: Vec<PlanEdit>,
}

#[derive(Debug, Deserialize)]
pub struct AssignPlanRequest {
    pub client_id: Uuid,
    pub start_date: Option<NaiveDate>,
}
