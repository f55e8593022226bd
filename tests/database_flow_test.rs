mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use antique_body::auth::{AuthError, AuthService, JwtService, RegisterRequest, UserRole};
use antique_body::errors::AppError;
use antique_body::models::{
    chat_id, AssignNutritionPlanRequest, ChangeEmailRequest, CoachingRequestStatus, CreateNutritionPlanRequest,
    FoodItem, Meal, NutritionPlanDocument, NutritionPlanStatus, TrainerSearchQuery, VerificationChannel,
};
use antique_body::services::{
    CodeDeliveryService, ConversationService, NutritionPlanService, TrainerSearchService, UserService,
    VerificationService,
};

use common::{unique_email, TestDatabase};

const JWT_SECRET: &str = "database-flow-secret";

fn registration(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        phone: None,
        password: "Str0ng!Pass9".to_string(),
        first_name: "Maya".to_string(),
        last_name: "Ortiz".to_string(),
        role: UserRole::Client,
    }
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() {
    let Some(db) = TestDatabase::connect().await else { return };
    let auth = AuthService::new(db.pool.clone(), JWT_SECRET);
    let email = unique_email("dup");
    db.verified(VerificationChannel::Email, &email).await;

    let first = auth.register(registration(&email)).await.unwrap();
    assert_eq!(first.user.email, email);

    let second = auth.register(registration(&email.to_uppercase())).await.unwrap_err();
    assert_matches!(second, AuthError::EmailAlreadyExists);
    assert_eq!(second.status_code(), axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn registration_requires_a_verified_email() {
    let Some(db) = TestDatabase::connect().await else { return };
    let auth = AuthService::new(db.pool.clone(), JWT_SECRET);

    let err = auth.register(registration(&unique_email("unverified"))).await.unwrap_err();
    assert_matches!(err, AuthError::VerificationRequired(_));
}

#[tokio::test]
async fn changing_email_to_a_taken_address_is_a_conflict() {
    let Some(db) = TestDatabase::connect().await else { return };
    let users = UserService::new(db.pool.clone());
    let owner = db.user(UserRole::Client).await;
    let other = db.user(UserRole::Client).await;

    let err = users
        .change_email(other.user_id, ChangeEmailRequest { email: owner.email.clone() })
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Auth(AuthError::EmailAlreadyExists));

    // Once the owner is gone the address is free again
    db.soft_delete(&owner).await;
    db.verified(VerificationChannel::Email, &owner.email).await;
    let updated = users
        .change_email(other.user_id, ChangeEmailRequest { email: owner.email.clone() })
        .await
        .unwrap();
    assert_eq!(updated.email, owner.email);
}

#[tokio::test]
async fn verification_code_is_consumed_once() {
    let Some(db) = TestDatabase::connect().await else { return };
    let verification = VerificationService::new(db.pool.clone(), CodeDeliveryService::log_only());
    let email = unique_email("verify");

    verification.send_code(VerificationChannel::Email, &email).await.unwrap();
    let code = db.pending_code(VerificationChannel::Email, &email).await.expect("code issued");

    let wrong = if code == "999999" { "100000" } else { "999999" };
    assert_matches!(
        verification.verify_code(VerificationChannel::Email, &email, wrong).await,
        Err(AppError::Validation(_))
    );

    let verified = verification.verify_code(VerificationChannel::Email, &email, &code).await.unwrap();
    assert!(verified.verified);

    assert_matches!(
        verification.verify_code(VerificationChannel::Email, &email, &code).await,
        Err(AppError::Validation(_))
    );
    assert_eq!(db.pending_code(VerificationChannel::Email, &email).await, None);
}

#[tokio::test]
async fn racing_verifications_accept_exactly_one() {
    let Some(db) = TestDatabase::connect().await else { return };
    let verification = VerificationService::new(db.pool.clone(), CodeDeliveryService::log_only());
    let email = unique_email("race");

    verification.send_code(VerificationChannel::Email, &email).await.unwrap();
    let code = db.pending_code(VerificationChannel::Email, &email).await.expect("code issued");

    let (a, b, c) = tokio::join!(
        verification.verify_code(VerificationChannel::Email, &email, &code),
        verification.verify_code(VerificationChannel::Email, &email, &code),
        verification.verify_code(VerificationChannel::Email, &email, &code),
    );
    let accepted = [a, b, c].into_iter().filter(Result::is_ok).count();
    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn racing_sends_never_fail_with_a_database_error() {
    let Some(db) = TestDatabase::connect().await else { return };
    let verification = VerificationService::new(db.pool.clone(), CodeDeliveryService::log_only());
    let email = unique_email("resend");

    let results = send_four_at_once(&verification, &email).await;
    for result in &results {
        if let Err(err) = result {
            assert_matches!(err, AppError::Conflict(_), "unexpected error: {err}");
        }
    }
    assert!(results.iter().any(Result::is_ok));

    let unused: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM email_verifications WHERE identifier = $1 AND NOT used")
        .bind(&email)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(unused, 1);
}

async fn send_four_at_once(
    verification: &VerificationService,
    email: &str,
) -> Vec<Result<antique_body::models::SendCodeResponse, AppError>> {
    let (a, b, c, d) = tokio::join!(
        verification.send_code(VerificationChannel::Email, email),
        verification.send_code(VerificationChannel::Email, email),
        verification.send_code(VerificationChannel::Email, email),
        verification.send_code(VerificationChannel::Email, email),
    );
    vec![a, b, c, d]
}

#[tokio::test]
async fn trainer_search_pages_follow_the_count() {
    let Some(db) = TestDatabase::connect().await else { return };
    let search = TrainerSearchService::new(db.pool.clone());
    let city = format!("Testville {}", Uuid::new_v4().simple());
    for _ in 0..5 {
        db.trainer_in(&city).await;
    }

    let query = |page| TrainerSearchQuery {
        location: Some(city.clone()),
        page: Some(page),
        limit: Some(2),
        ..Default::default()
    };

    let first = search.search(query(1).into_filter().unwrap()).await.unwrap();
    assert_eq!(first.pagination.total, 5);
    assert_eq!(first.pagination.pages, 3);
    assert_eq!(first.trainers.len(), 2);

    let last = search.search(query(3).into_filter().unwrap()).await.unwrap();
    assert_eq!(last.trainers.len(), 1);

    let beyond = search.search(query(i64::MAX).into_filter().unwrap()).await.unwrap();
    assert!(beyond.trainers.is_empty());
    assert_eq!(beyond.pagination.total, 5);
}

#[tokio::test]
async fn blocked_chat_is_hidden_from_the_trainer_only() {
    let Some(db) = TestDatabase::connect().await else { return };
    let conversations = ConversationService::new(db.pool.clone());
    let trainer = db.user(UserRole::Trainer).await;
    let client = db.user(UserRole::Client).await;
    db.link(&trainer, &client, CoachingRequestStatus::Accepted).await;
    conversations.start_conversation(&client, trainer.user_id).await.unwrap();

    let chat = chat_id(trainer.user_id, client.user_id);
    let listed = conversations.list_conversations(&trainer).await.unwrap();
    assert!(listed.iter().any(|c| c.chat_id == chat));

    conversations.block_chat(&trainer, &chat).await.unwrap();

    let listed = conversations.list_conversations(&trainer).await.unwrap();
    assert!(listed.iter().all(|c| c.chat_id != chat));

    let client_view = conversations.list_conversations(&client).await.unwrap();
    assert!(client_view.iter().any(|c| c.chat_id == chat));
}

#[tokio::test]
async fn deleted_counterpart_drops_out_of_the_conversation_list() {
    let Some(db) = TestDatabase::connect().await else { return };
    let conversations = ConversationService::new(db.pool.clone());
    let trainer = db.user(UserRole::Trainer).await;
    let client = db.user(UserRole::Client).await;
    let pending_client = db.user(UserRole::Client).await;
    db.link(&trainer, &client, CoachingRequestStatus::Accepted).await;
    db.link(&trainer, &pending_client, CoachingRequestStatus::Pending).await;
    conversations.start_conversation(&trainer, client.user_id).await.unwrap();

    let listed = conversations.list_conversations(&trainer).await.unwrap();
    assert_eq!(listed.len(), 2);

    db.soft_delete(&client).await;
    db.soft_delete(&pending_client).await;

    let listed = conversations.list_conversations(&trainer).await.unwrap();
    assert!(listed.is_empty(), "{listed:?}");
}

#[tokio::test]
async fn activating_a_diet_closes_the_previous_one() {
    let Some(db) = TestDatabase::connect().await else { return };
    let nutrition = NutritionPlanService::new(db.pool.clone());
    let trainer = db.user(UserRole::Trainer).await;
    let client = db.user(UserRole::Client).await;
    db.link(&trainer, &client, CoachingRequestStatus::Accepted).await;

    let plan = nutrition
        .create_plan(
            &trainer,
            CreateNutritionPlanRequest {
                title: "Lean bulk".to_string(),
                description: None,
                plan: NutritionPlanDocument {
                    meals: vec![Meal {
                        name: "Breakfast".to_string(),
                        time: Some("07:30".to_string()),
                        foods: vec![FoodItem {
                            name: "Greek yogurt".to_string(),
                            portion_grams: 200.0,
                            calories: 146.0,
                            protein_g: 20.0,
                            carbs_g: 8.0,
                            fat_g: 4.0,
                            portion_multiplier: 1.5,
                        }],
                    }],
                },
            },
        )
        .await
        .unwrap();
    assert_eq!(plan.meal_totals[0].totals.protein_g, 30.0);

    let assign = || AssignNutritionPlanRequest { client_id: client.user_id };
    let first = nutrition.assign_plan(&trainer, plan.plan.id, assign()).await.unwrap();
    let second = nutrition.assign_plan(&trainer, plan.plan.id, assign()).await.unwrap();

    nutrition
        .update_assigned_status(&client, first.plan.id, NutritionPlanStatus::Active)
        .await
        .unwrap();
    nutrition
        .update_assigned_status(&client, second.plan.id, NutritionPlanStatus::Active)
        .await
        .unwrap();

    let active: Vec<Uuid> = sqlx::query_scalar(
        "SELECT assigned_nutrition_plan_id FROM diet_plan_assignments WHERE client_id = $1 AND is_active",
    )
    .bind(client.user_id)
    .fetch_all(&db.pool)
    .await
    .unwrap();
    assert_eq!(active, vec![second.plan.id]);

    let err = nutrition
        .update_assigned_status(&client, second.plan.id, NutritionPlanStatus::Assigned)
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Validation(_));
}

#[tokio::test]
async fn deleted_account_token_stops_working() {
    let Some(db) = TestDatabase::connect().await else { return };
    let auth = AuthService::new(db.pool.clone(), JWT_SECRET);
    let user = db.user(UserRole::Client).await;
    let jwt = JwtService::new(JWT_SECRET);
    let (access, refresh) = jwt.create_token_pair(user.user_id, &user.email, user.role).unwrap();

    let session = auth.validate_session(&access).await.unwrap();
    assert_eq!(session.user_id, user.user_id);
    assert_matches!(auth.validate_session(&refresh).await, Err(AuthError::InvalidToken));

    db.soft_delete(&user).await;
    assert_matches!(auth.validate_session(&access).await, Err(AuthError::AccountDeleted));
}
