use chrono::Utc;
use sqlx::{types::Json, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::nutrition_plan::validate_title;
use crate::models::{
    AssignNutritionPlanRequest, AssignedNutritionPlan, CreateNutritionPlanRequest, DietPlanAssignment, NutritionPlan,
    NutritionPlanDocument, NutritionPlanResponse, NutritionPlanStatus, UpdateNutritionPlanRequest,
};
use crate::services::coaching_request_service::has_accepted_relationship;

const PLAN_COLUMNS: &str = "id, trainer_id, title, description, plan_data, created_at, updated_at";
const ASSIGNED_COLUMNS: &str =
    "id, plan_id, trainer_id, client_id, title, plan_data, status, created_at, updated_at";

fn prepare_document(mut plan: NutritionPlanDocument) -> AppResult<NutritionPlanDocument> {
    plan.normalize();
    plan.validate()?;
    Ok(plan)
}

#[derive(Clone)]
pub struct NutritionPlanService {
    db: PgPool,
}

impl NutritionPlanService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_plan(
        &self,
        session: &UserSession,
        request: CreateNutritionPlanRequest,
    ) -> AppResult<NutritionPlanResponse<NutritionPlan>> {
        session.require_role(UserRole::Trainer)?;

        let title = validate_title(&request.title)?;
        let plan = prepare_document(request.plan)?;
        let description = request.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());

        let created = sqlx::query_as::<_, NutritionPlan>(&format!(
            "INSERT INTO nutrition_plans (id, trainer_id, title, description, plan_data)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(session.user_id)
        .bind(&title)
        .bind(description)
        .bind(Json(&plan))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(plan_id = %created.id, meals = plan.meals.len(), "Nutrition plan created");
        Ok(NutritionPlanResponse::new(created))
    }

    pub async fn list_plans(&self, session: &UserSession) -> AppResult<Vec<NutritionPlanResponse<NutritionPlan>>> {
        session.require_role(UserRole::Trainer)?;

        let plans = sqlx::query_as::<_, NutritionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM nutrition_plans WHERE trainer_id = $1 ORDER BY updated_at DESC"
        ))
        .bind(session.user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(plans.into_iter().map(NutritionPlanResponse::new).collect())
    }

    pub async fn get_plan(&self, session: &UserSession, plan_id: Uuid) -> AppResult<NutritionPlanResponse<NutritionPlan>> {
        self.owned_plan(session, plan_id).await.map(NutritionPlanResponse::new)
    }

    pub async fn update_plan(
        &self,
        session: &UserSession,
        plan_id: Uuid,
        request: UpdateNutritionPlanRequest,
    ) -> AppResult<NutritionPlanResponse<NutritionPlan>> {
        let existing = self.owned_plan(session, plan_id).await?;

        let title = match request.title {
            Some(title) => validate_title(&title)?,
            None => existing.title,
        };
        let description = match request.description {
            Some(description) => Some(description.trim().to_string()).filter(|d| !d.is_empty()),
            None => existing.description,
        };
        let plan = match request.plan {
            Some(plan) => prepare_document(plan)?,
            None => existing.plan_data.0,
        };

        let saved = sqlx::query_as::<_, NutritionPlan>(&format!(
            "UPDATE nutrition_plans
             SET title = $2, description = $3, plan_data = $4, updated_at = NOW()
             WHERE id = $1
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(plan_id)
        .bind(&title)
        .bind(description)
        .bind(Json(&plan))
        .fetch_one(&self.db)
        .await?;

        Ok(NutritionPlanResponse::new(saved))
    }

    pub async fn delete_plan(&self, session: &UserSession, plan_id: Uuid) -> AppResult<()> {
        self.owned_plan(session, plan_id).await?;

        sqlx::query("DELETE FROM nutrition_plans WHERE id = $1")
            .bind(plan_id)
            .execute(&self.db)
            .await?;

        tracing::info!(plan_id = %plan_id, "Nutrition plan deleted");
        Ok(())
    }

    pub async fn assign_plan(
        &self,
        session: &UserSession,
        plan_id: Uuid,
        request: AssignNutritionPlanRequest,
    ) -> AppResult<NutritionPlanResponse<AssignedNutritionPlan>> {
        let plan = self.owned_plan(session, plan_id).await?;

        if !has_accepted_relationship(&self.db, session.user_id, request.client_id).await? {
            return Err(AppError::forbidden(
                "Plans can only be assigned to clients with an accepted coaching request",
            ));
        }

        let assigned = sqlx::query_as::<_, AssignedNutritionPlan>(&format!(
            "INSERT INTO assigned_nutrition_plans (id, plan_id, trainer_id, client_id, title, plan_data, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'assigned')
             RETURNING {ASSIGNED_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(plan.id)
        .bind(session.user_id)
        .bind(request.client_id)
        .bind(&plan.title)
        .bind(&plan.plan_data)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            plan_id = %plan.id,
            client_id = %request.client_id,
            assignment_id = %assigned.id,
            "Nutrition plan assigned"
        );
        Ok(NutritionPlanResponse::new(assigned))
    }

    pub async fn list_assigned(
        &self,
        session: &UserSession,
    ) -> AppResult<Vec<NutritionPlanResponse<AssignedNutritionPlan>>> {
        let column = match session.role {
            UserRole::Client => "client_id",
            UserRole::Trainer => "trainer_id",
            UserRole::Admin => return Err(AppError::forbidden("Only trainers and clients have assigned plans")),
        };

        let plans = sqlx::query_as::<_, AssignedNutritionPlan>(&format!(
            "SELECT {ASSIGNED_COLUMNS} FROM assigned_nutrition_plans
             WHERE {column} = $1
             ORDER BY updated_at DESC"
        ))
        .bind(session.user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(plans.into_iter().map(NutritionPlanResponse::new).collect())
    }

    /// Moves an assigned plan through its lifecycle. The status change and the
    /// diet assignment bookkeeping commit together or not at all.
    pub async fn update_assigned_status(
        &self,
        session: &UserSession,
        assigned_id: Uuid,
        next: NutritionPlanStatus,
    ) -> AppResult<NutritionPlanResponse<AssignedNutritionPlan>> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_as::<_, AssignedNutritionPlan>(&format!(
            "SELECT {ASSIGNED_COLUMNS} FROM assigned_nutrition_plans WHERE id = $1 FOR UPDATE"
        ))
        .bind(assigned_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Assigned nutrition plan not found"))?;

        if current.client_id != session.user_id && current.trainer_id != session.user_id {
            return Err(AppError::forbidden("You are not part of this nutrition plan"));
        }

        if !current.status.can_transition_to(next) {
            return Err(AppError::validation(format!(
                "Cannot move a nutrition plan from {:?} to {:?}",
                current.status, next
            )));
        }

        let updated = sqlx::query_as::<_, AssignedNutritionPlan>(&format!(
            "UPDATE assigned_nutrition_plans SET status = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {ASSIGNED_COLUMNS}"
        ))
        .bind(assigned_id)
        .bind(next)
        .fetch_one(&mut *tx)
        .await?;

        sync_diet_assignment(&mut tx, &updated).await?;

        tx.commit().await?;

        tracing::info!(
            assignment_id = %assigned_id,
            from = ?current.status,
            to = ?next,
            "Nutrition plan status changed"
        );
        Ok(NutritionPlanResponse::new(updated))
    }

    async fn owned_plan(&self, session: &UserSession, plan_id: Uuid) -> AppResult<NutritionPlan> {
        session.require_role(UserRole::Trainer)?;

        let plan = sqlx::query_as::<_, NutritionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM nutrition_plans WHERE id = $1"
        ))
        .bind(plan_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Nutrition plan not found"))?;

        if plan.trainer_id != session.user_id {
            return Err(AppError::forbidden("You do not own this nutrition plan"));
        }

        Ok(plan)
    }
}

/// Keeps `diet_plan_assignments` in step with the plan status. A client follows
/// one active diet at a time, so activation closes any other active one.
async fn sync_diet_assignment(
    tx: &mut Transaction<'_, Postgres>,
    plan: &AssignedNutritionPlan,
) -> Result<(), sqlx::Error> {
    let today = Utc::now().date_naive();

    match plan.status {
        NutritionPlanStatus::Active => {
            sqlx::query(
                "UPDATE diet_plan_assignments SET is_active = FALSE, end_date = $3
                 WHERE client_id = $1 AND assigned_nutrition_plan_id <> $2 AND is_active",
            )
            .bind(plan.client_id)
            .bind(plan.id)
            .bind(today)
            .execute(&mut **tx)
            .await?;

            let assignment = sqlx::query_as::<_, DietPlanAssignment>(
                "INSERT INTO diet_plan_assignments
                    (id, assigned_nutrition_plan_id, client_id, start_date, is_active)
                 VALUES ($1, $2, $3, $4, TRUE)
                 ON CONFLICT (assigned_nutrition_plan_id)
                 DO UPDATE SET is_active = TRUE, end_date = NULL
                 RETURNING id, assigned_nutrition_plan_id, client_id, start_date, end_date, is_active",
            )
            .bind(Uuid::new_v4())
            .bind(plan.id)
            .bind(plan.client_id)
            .bind(today)
            .fetch_one(&mut **tx)
            .await?;

            tracing::debug!(
                diet_assignment_id = %assignment.id,
                since = %assignment.start_date,
                "Diet assignment active"
            );
        }
        NutritionPlanStatus::Paused => {
            sqlx::query("UPDATE diet_plan_assignments SET is_active = FALSE WHERE assigned_nutrition_plan_id = $1")
                .bind(plan.id)
                .execute(&mut **tx)
                .await?;
        }
        NutritionPlanStatus::Completed => {
            sqlx::query(
                "UPDATE diet_plan_assignments SET is_active = FALSE, end_date = $2
                 WHERE assigned_nutrition_plan_id = $1",
            )
            .bind(plan.id)
            .bind(today)
            .execute(&mut **tx)
            .await?;
        }
        NutritionPlanStatus::Assigned => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FoodItem, Meal};

    #[test]
    fn test_prepare_document_collapses_names() {
        let plan = NutritionPlanDocument {
            meals: vec![Meal {
                name: "  Post   workout ".to_string(),
                time: Some("  ".to_string()),
                foods: vec![FoodItem {
                    name: " Greek  yogurt".to_string(),
                    portion_grams: 170.0,
                    calories: 100.0,
                    protein_g: 17.0,
                    carbs_g: 6.0,
                    fat_g: 0.7,
                    portion_multiplier: 1.0,
                }],
            }],
        };

        let prepared = prepare_document(plan).unwrap();
        assert_eq!(prepared.meals[0].name, "Post workout");
        assert_eq!(prepared.meals[0].time, None);
        assert_eq!(prepared.meals[0].foods[0].name, "Greek yogurt");
    }

    #[test]
    fn test_prepare_document_requires_meals() {
        assert!(matches!(
            prepare_document(NutritionPlanDocument::default()),
            Err(AppError::Validation(_))
        ));
    }
}
