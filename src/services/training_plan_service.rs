use chrono::Utc;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::training_plan::validate_title;
use crate::models::{
    AssignPlanRequest, AssignedTrainingPlan, CreateTrainingPlanRequest, PlanEdit, TrainingPlan,
    TrainingPlanDocument, UpdateTrainingPlanRequest,
};
use crate::services::coaching_request_service::has_accepted_relationship;

const PLAN_COLUMNS: &str = "id, trainer_id, title, description, plan_data, created_at, updated_at";
const ASSIGNED_COLUMNS: &str =
    "id, plan_id, trainer_id, client_id, title, plan_data, status, start_date, created_at";

/// Normalizes exercise data and rejects structurally invalid plans.
fn prepare_document(mut plan: TrainingPlanDocument) -> AppResult<TrainingPlanDocument> {
    plan.normalize();
    plan.validate()?;
    Ok(plan)
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

#[derive(Clone)]
pub struct TrainingPlanService {
    db: PgPool,
}

impl TrainingPlanService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_plan(&self, session: &UserSession, request: CreateTrainingPlanRequest) -> AppResult<TrainingPlan> {
        session.require_role(UserRole::Trainer)?;

        let title = validate_title(&request.title)?;
        let plan = prepare_document(request.plan)?;

        let created = sqlx::query_as::<_, TrainingPlan>(&format!(
            "INSERT INTO training_plans (id, trainer_id, title, description, plan_data)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(session.user_id)
        .bind(&title)
        .bind(clean_description(request.description))
        .bind(Json(&plan))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(plan_id = %created.id, sets = plan.total_sets(), "Training plan created");
        Ok(created)
    }

    pub async fn list_plans(&self, session: &UserSession) -> AppResult<Vec<TrainingPlan>> {
        session.require_role(UserRole::Trainer)?;

        let plans = sqlx::query_as::<_, TrainingPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM training_plans WHERE trainer_id = $1 ORDER BY updated_at DESC"
        ))
        .bind(session.user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(plans)
    }

    pub async fn get_plan(&self, session: &UserSession, plan_id: Uuid) -> AppResult<TrainingPlan> {
        session.require_role(UserRole::Trainer)?;

        let plan = sqlx::query_as::<_, TrainingPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM training_plans WHERE id = $1"
        ))
        .bind(plan_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Training plan not found"))?;

        if plan.trainer_id != session.user_id {
            return Err(AppError::forbidden("You do not own this training plan"));
        }

        Ok(plan)
    }

    pub async fn update_plan(
        &self,
        session: &UserSession,
        plan_id: Uuid,
        request: UpdateTrainingPlanRequest,
    ) -> AppResult<TrainingPlan> {
        let existing = self.get_plan(session, plan_id).await?;

        let title = match request.title {
            Some(title) => validate_title(&title)?,
            None => existing.title,
        };
        let description = match request.description {
            Some(description) => clean_description(Some(description)),
            None => existing.description,
        };
        let plan = match request.plan {
            Some(plan) => prepare_document(plan)?,
            None => existing.plan_data.0,
        };

        self.save(plan_id, &title, description.as_deref(), &plan).await
    }

    /// Applies builder edits atomically: any failing step leaves the stored plan untouched.
    pub async fn edit_plan(&self, session: &UserSession, plan_id: Uuid, edits: Vec<PlanEdit>) -> AppResult<TrainingPlan> {
        if edits.is_empty() {
            return Err(AppError::validation("No edits supplied"));
        }

        let existing = self.get_plan(session, plan_id).await?;
        let mut plan = existing.plan_data.0;
        plan.apply_all(edits)?;
        let plan = prepare_document(plan)?;

        self.save(plan_id, &existing.title, existing.description.as_deref(), &plan).await
    }

    pub async fn delete_plan(&self, session: &UserSession, plan_id: Uuid) -> AppResult<()> {
        self.get_plan(session, plan_id).await?;

        sqlx::query("DELETE FROM training_plans WHERE id = $1")
            .bind(plan_id)
            .execute(&self.db)
            .await?;

        tracing::info!(plan_id = %plan_id, "Training plan deleted");
        Ok(())
    }

    /// Copies the plan to a client with an accepted coaching request.
    pub async fn assign_plan(
        &self,
        session: &UserSession,
        plan_id: Uuid,
        request: AssignPlanRequest,
    ) -> AppResult<AssignedTrainingPlan> {
        let plan = self.get_plan(session, plan_id).await?;

        if !has_accepted_relationship(&self.db, session.user_id, request.client_id).await? {
            return Err(AppError::forbidden(
                "Plans can only be assigned to clients with an accepted coaching request",
            ));
        }

        let start_date = request.start_date.unwrap_or_else(|| Utc::now().date_naive());

        let assigned = sqlx::query_as::<_, AssignedTrainingPlan>(&format!(
            "INSERT INTO assigned_training_plans (id, plan_id, trainer_id, client_id, title, plan_data, status, start_date)
             VALUES ($1, $2, $3, $4, $5, $6, 'active', $7)
             RETURNING {ASSIGNED_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(plan.id)
        .bind(session.user_id)
        .bind(request.client_id)
        .bind(&plan.title)
        .bind(&plan.plan_data)
        .bind(start_date)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            plan_id = %plan.id,
            client_id = %request.client_id,
            assignment_id = %assigned.id,
            "Training plan assigned"
        );
        Ok(assigned)
    }

    /// Clients see plans assigned to them, trainers the plans they assigned.
    pub async fn list_assigned(&self, session: &UserSession) -> AppResult<Vec<AssignedTrainingPlan>> {
        let column = match session.role {
            UserRole::Client => "client_id",
            UserRole::Trainer => "trainer_id",
            UserRole::Admin => return Err(AppError::forbidden("Only trainers and clients have assigned plans")),
        };

        let plans = sqlx::query_as::<_, AssignedTrainingPlan>(&format!(
            "SELECT {ASSIGNED_COLUMNS} FROM assigned_training_plans
             WHERE {column} = $1
             ORDER BY start_date DESC, created_at DESC"
        ))
        .bind(session.user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(plans)
    }

    async fn save(
        &self,
        plan_id: Uuid,
        title: &str,
        description: Option<&str>,
        plan: &TrainingPlanDocument,
    ) -> AppResult<TrainingPlan> {
        let saved = sqlx::query_as::<_, TrainingPlan>(&format!(
            "UPDATE training_plans
             SET title = $2, description = $3, plan_data = $4, updated_at = NOW()
             WHERE id = $1
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(plan_id)
        .bind(title)
        .bind(description)
        .bind(Json(plan))
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Training plan not found"))?;

        Ok(saved)
    }
}
