//! Repository for property listing and review data access operations.

use crate::entities::{
    CreatePropertyRequest, CreateReviewRequest, ListingPayment, Property, Review, ValidationStatus,
};
use crate::types::{ListingError, ListingResult};
use sqlx::{Row, SqlitePool};
use tracing::info;

const PROPERTY_COLUMNS: &str = "id, public_id, team_id, owner_id, title, description, price, \
     city, address, images, validation_status, payment_ref, payment_date, payment_amount, \
     service_name, created_at, updated_at";

/// Repository for property database operations
pub struct PropertyRepository {
    pool: SqlitePool,
}

impl PropertyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a listing awaiting validation
    pub async fn create(
        &self,
        team_id: i64,
        owner_id: i64,
        request: &CreatePropertyRequest,
    ) -> ListingResult<Property> {
        if request.price <= 0 {
            return Err(ListingError::InvalidInput(
                "price must be positive".to_string(),
            ));
        }
        if request.title.trim().is_empty() {
            return Err(ListingError::InvalidInput("title is required".to_string()));
        }

        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();
        let images = serde_json::to_string(&request.images)
            .map_err(|e| ListingError::InvalidInput(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO properties (public_id, team_id, owner_id, title, description, price, \
             city, address, images, validation_status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
        )
        .bind(&public_id)
        .bind(team_id)
        .bind(owner_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.price)
        .bind(&request.city)
        .bind(&request.address)
        .bind(&images)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

        let property_id = result.last_insert_rowid();

        info!(
            property_id = property_id,
            public_id = %public_id,
            team_id = team_id,
            "created new property listing"
        );

        Ok(Property {
            id: property_id,
            public_id,
            team_id,
            owner_id,
            title: request.title.clone(),
            description: request.description.clone(),
            price: request.price,
            city: request.city.clone(),
            address: request.address.clone(),
            images: request.images.clone(),
            validation_status: ValidationStatus::Pending,
            payment_ref: None,
            payment_date: None,
            payment_amount: None,
            service_name: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn find_by_team(&self, team_id: i64) -> ListingResult<Vec<Property>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE team_id = ? ORDER BY created_at DESC"
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(map_property_row).collect()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> ListingResult<Option<Property>> {
        let row = sqlx::query(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

        row.map(map_property_row).transpose()
    }

    /// Verified listings for the public marketplace, optionally by city
    pub async fn find_verified(&self, city: Option<&str>) -> ListingResult<Vec<Property>> {
        let rows = match city {
            Some(city) => {
                sqlx::query(&format!(
                    "SELECT {PROPERTY_COLUMNS} FROM properties \
                     WHERE validation_status = 'verified' AND city = ? ORDER BY created_at DESC"
                ))
                .bind(city)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {PROPERTY_COLUMNS} FROM properties \
                     WHERE validation_status = 'verified' ORDER BY created_at DESC"
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(map_property_row).collect()
    }

    /// Record a listing-boost payment. Validation stays with the reviewers;
    /// only the payment trail is written here.
    pub async fn record_listing_payment(
        &self,
        public_id: &str,
        payment: &ListingPayment,
    ) -> ListingResult<()> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE properties SET payment_ref = ?, payment_date = ?, payment_amount = ?, \
             service_name = ?, validation_status = 'payment_pending', updated_at = ? \
             WHERE public_id = ? AND validation_status = 'pending'",
        )
        .bind(&payment.payment_ref)
        .bind(&now)
        .bind(payment.payment_amount)
        .bind(&payment.service_name)
        .bind(&now)
        .bind(public_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(ListingError::PropertyNotFound);
        }

        info!(public_id = public_id, payment_ref = %payment.payment_ref, "recorded listing payment");
        Ok(())
    }

    /// Apply a validation decision to a listing still awaiting one
    pub async fn set_validation_status(
        &self,
        public_id: &str,
        decision: ValidationStatus,
    ) -> ListingResult<()> {
        if !matches!(
            decision,
            ValidationStatus::Verified | ValidationStatus::Rejected
        ) {
            return Err(ListingError::InvalidTransition);
        }

        let result = sqlx::query(
            "UPDATE properties SET validation_status = ?, updated_at = ? \
             WHERE public_id = ? AND validation_status IN ('pending', 'payment_pending')",
        )
        .bind(decision.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(public_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(ListingError::InvalidTransition);
        }

        info!(public_id = public_id, decision = %decision, "applied listing validation decision");
        Ok(())
    }

    /// Create a review on a verified listing
    pub async fn create_review(
        &self,
        property_id: i64,
        request: &CreateReviewRequest,
    ) -> ListingResult<Review> {
        if !(1..=5).contains(&request.rating) {
            return Err(ListingError::InvalidInput(
                "rating must be between 1 and 5".to_string(),
            ));
        }

        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO reviews (property_id, author_name, rating, comment, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(property_id)
        .bind(&request.author_name)
        .bind(request.rating)
        .bind(&request.comment)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

        Ok(Review {
            id: result.last_insert_rowid(),
            property_id,
            author_name: request.author_name.clone(),
            rating: request.rating,
            comment: request.comment.clone(),
            created_at: now,
        })
    }

    pub async fn find_reviews(&self, property_id: i64) -> ListingResult<Vec<Review>> {
        let rows = sqlx::query(
            "SELECT id, property_id, author_name, rating, comment, created_at \
             FROM reviews WHERE property_id = ? ORDER BY created_at DESC",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(Review {
                    id: row
                        .try_get("id")
                        .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
                    property_id: row
                        .try_get("property_id")
                        .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
                    author_name: row
                        .try_get("author_name")
                        .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
                    rating: row
                        .try_get("rating")
                        .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
                    comment: row
                        .try_get("comment")
                        .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
                    created_at: row
                        .try_get("created_at")
                        .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
                })
            })
            .collect()
    }
}

fn map_property_row(row: sqlx::sqlite::SqliteRow) -> ListingResult<Property> {
    let status_str: String = row
        .try_get("validation_status")
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;
    let images_json: String = row
        .try_get("images")
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;
    let images: Vec<String> = serde_json::from_str(&images_json).unwrap_or_default();

    Ok(Property {
        id: row
            .try_get("id")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        public_id: row
            .try_get("public_id")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        team_id: row
            .try_get("team_id")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        owner_id: row
            .try_get("owner_id")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        title: row
            .try_get("title")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        description: row
            .try_get("description")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        price: row
            .try_get("price")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        city: row
            .try_get("city")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        address: row
            .try_get("address")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        images,
        validation_status: ValidationStatus::from(status_str.as_str()),
        payment_ref: row
            .try_get("payment_ref")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        payment_date: row
            .try_get("payment_date")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        payment_amount: row
            .try_get("payment_amount")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        service_name: row
            .try_get("service_name")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
    })
}
