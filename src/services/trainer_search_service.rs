use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::errors::AppResult;
use crate::models::{Pagination, TrainerCard, TrainerFilter, TrainerSearchResponse, TrainerSort};
use crate::utils::{haversine_km, round_to_tenth};

/// Joined trainer/profile projection matching [`TrainerCard`].
pub const TRAINER_CARD_SELECT: &str = "SELECT u.id, u.first_name, u.last_name, tp.bio, tp.specialties, \
     tp.city, tp.state, tp.country, tp.latitude, tp.longitude, tp.price_per_session, tp.availability, \
     tp.accepting_clients, tp.rating, tp.years_experience, u.created_at \
     FROM users u JOIN trainer_profiles tp ON tp.user_id = u.id";

const TRAINER_COUNT_SELECT: &str =
    "SELECT COUNT(*) FROM users u JOIN trainer_profiles tp ON tp.user_id = u.id";

/// Wraps a user term for ILIKE, escaping its wildcards.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &TrainerFilter) {
    qb.push(" WHERE u.role = 'trainer' AND u.deleted_at IS NULL");

    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (u.first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR (u.first_name || ' ' || u.last_name) ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR tp.bio ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM unnest(tp.specialties) s WHERE s ILIKE ")
            .push_bind(pattern)
            .push("))");
    }

    if let Some(location) = &filter.location {
        let pattern = like_pattern(location);
        qb.push(" AND (tp.city ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR tp.state ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR tp.country ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(min) = filter.min_price {
        qb.push(" AND tp.price_per_session >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND tp.price_per_session <= ").push_bind(max);
    }

    if !filter.tags.is_empty() {
        qb.push(" AND EXISTS (SELECT 1 FROM unnest(tp.specialties) s WHERE lower(s) = ANY(")
            .push_bind(filter.tags.clone())
            .push("))");
    }

    if filter.available_only {
        qb.push(" AND tp.accepting_clients AND cardinality(tp.availability) > 0");
    }
}

fn order_clause(sort: TrainerSort) -> &'static str {
    match sort {
        TrainerSort::Newest | TrainerSort::Distance => " ORDER BY u.created_at DESC, u.id",
        TrainerSort::PriceAsc => " ORDER BY tp.price_per_session ASC NULLS LAST, u.created_at DESC, u.id",
        TrainerSort::PriceDesc => " ORDER BY tp.price_per_session DESC NULLS LAST, u.created_at DESC, u.id",
        TrainerSort::Rating => " ORDER BY tp.rating DESC NULLS LAST, u.created_at DESC, u.id",
    }
}

/// Sets `distance_km` on every trainer with coordinates.
pub fn attach_distances(trainers: &mut [TrainerCard], origin: (f64, f64)) {
    for trainer in trainers.iter_mut() {
        trainer.distance_km = trainer
            .coordinates()
            .map(|coords| round_to_tenth(haversine_km(origin, coords)));
    }
}

/// Nearest first; trainers without a distance go last in their existing order.
pub fn sort_by_distance(trainers: &mut [TrainerCard]) {
    trainers.sort_by(|a, b| match (a.distance_km, b.distance_km) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

#[derive(Clone)]
pub struct TrainerSearchService {
    db: PgPool,
}

impl TrainerSearchService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn search(&self, filter: TrainerFilter) -> AppResult<TrainerSearchResponse> {
        let mut count_query = QueryBuilder::<Postgres>::new(TRAINER_COUNT_SELECT);
        push_filters(&mut count_query, &filter);
        let total: i64 = count_query.build_query_scalar().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(TRAINER_CARD_SELECT);
        push_filters(&mut query, &filter);
        query.push(order_clause(filter.sort));

        // Distance ordering happens in memory, so the whole filtered set is loaded
        let paged_in_sql = filter.sort != TrainerSort::Distance;
        if paged_in_sql {
            query
                .push(" LIMIT ")
                .push_bind(filter.limit)
                .push(" OFFSET ")
                .push_bind(filter.offset());
        }

        let mut trainers: Vec<TrainerCard> = query.build_query_as().fetch_all(&self.db).await?;

        if let Some(origin) = filter.origin {
            attach_distances(&mut trainers, origin);
        }

        if !paged_in_sql {
            sort_by_distance(&mut trainers);
            trainers = trainers
                .into_iter()
                .skip(usize::try_from(filter.offset()).unwrap_or(usize::MAX))
                .take(filter.limit as usize)
                .collect();
        }

        tracing::debug!(total, returned = trainers.len(), page = filter.page, "Trainer search");

        Ok(TrainerSearchResponse {
            trainers,
            pagination: Pagination::new(total, filter.page, filter.limit),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn card(name: &str, coords: Option<(f64, f64)>) -> TrainerCard {
        TrainerCard {
            id: Uuid::new_v4(),
            first_name: name.to_string(),
            last_name: "Coach".to_string(),
            bio: None,
            specialties: vec![],
            city: None,
            state: None,
            country: None,
            latitude: coords.map(|c| c.0),
            longitude: coords.map(|c| c.1),
            price_per_session: None,
            availability: vec![],
            accepting_clients: true,
            rating: None,
            years_experience: None,
            created_at: Utc::now(),
            distance_km: None,
        }
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("yoga"), "%yoga%");
        assert_eq!(like_pattern("100%_fit"), "%100\\%\\_fit%");
    }

    #[test]
    fn test_distance_sort_puts_unlocated_trainers_last() {
        let london = (51.5074, -0.1278);
        let mut trainers = vec![
            card("Nowhere", None),
            card("Paris", Some((48.8566, 2.3522))),
            card("Oxford", Some((51.7520, -1.2577))),
        ];

        attach_distances(&mut trainers, london);
        sort_by_distance(&mut trainers);

        let names: Vec<&str> = trainers.iter().map(|t| t.first_name.as_str()).collect();
        assert_eq!(names, vec!["Oxford", "Paris", "Nowhere"]);
        assert!(trainers[2].distance_km.is_none());

        let oxford = trainers[0].distance_km.unwrap();
        assert!((80.0..85.0).contains(&oxford));
        assert_eq!(oxford, round_to_tenth(oxford));
    }

    #[test]
    fn test_filters_are_bound_not_interpolated() {
        let filter = TrainerFilter {
            search: Some("Robert'); DROP TABLE users;--".to_string()),
            location: Some("Leeds".to_string()),
            min_price: Some(20.0),
            max_price: Some(80.0),
            tags: vec!["strength".to_string()],
            available_only: true,
            origin: None,
            sort: TrainerSort::PriceAsc,
            page: 1,
            limit: 12,
        };

        let mut qb = QueryBuilder::<Postgres>::new(TRAINER_COUNT_SELECT);
        push_filters(&mut qb, &filter);
        let sql = qb.sql();

        assert!(!sql.contains("DROP TABLE"));
        assert!(sql.contains("tp.price_per_session >= $"));
        assert!(sql.contains("cardinality(tp.availability) > 0"));
    }
}
