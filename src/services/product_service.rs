use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, LoaderTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, SqlErr,
    TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditAction},
    dto::products::{CreateProductRequest, CreateReviewRequest, ProductList, UpdateProductRequest},
    entity::{
        product_images::{
            ActiveModel as ImageActive, Column as ImageCol, Entity as ProductImages,
        },
        products::{ActiveModel, Column, Entity as Products},
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_owner_or_admin},
    models::{Product, ProductDetail, ProductWithSeller, Review, Seller, product_from_entity},
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    state::AppState,
};

/// Escape LIKE wildcards so user input is matched literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Combine the optional catalog filters with AND. Blank text filters are ignored.
pub fn build_filter(query: &ProductQuery) -> Condition {
    let mut condition = Condition::all();

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Title).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(category) = query.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Category.eq(category));
    }

    if let Some(product_condition) = query.condition {
        condition = condition.add(Column::Condition.eq(product_condition));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    if let Some(seller_id) = query.seller_id {
        condition = condition.add(Column::SellerId.eq(seller_id));
    }

    condition
}

pub fn product_finder(query: &ProductQuery) -> Select<Products> {
    Products::find()
        .filter(build_filter(query))
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id)
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let finder = product_finder(&query);

    let total = finder.clone().count(&state.orm).await? as i64;

    let products = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let images = products.load_many(ProductImages, &state.orm).await?;
    let sellers = products.load_one(Users, &state.orm).await?;

    let items = products
        .into_iter()
        .zip(images)
        .zip(sellers)
        .map(|((product, images), seller)| ProductWithSeller {
            product: product_from_entity(product, images),
            seller: seller.map(Seller::from),
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let images = product.find_related(ProductImages).all(&state.orm).await?;
    let seller = product.find_related(Users).one(&state.orm).await?;
    let reviews = product
        .find_related(Reviews)
        .order_by_desc(ReviewCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let detail = ProductDetail {
        product: product_from_entity(product, images),
        seller: seller.map(Seller::from),
        reviews: reviews.into_iter().map(Review::from).collect(),
    };
    Ok(ApiResponse::success("Product", detail, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    payload.validate()?;
    let txn = state.orm.begin().await?;

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(payload.title.trim().to_string()),
        description: Set(payload.description),
        price: Set(payload.price),
        category: Set(payload.category.trim().to_string()),
        condition: Set(payload.condition),
        stock_quantity: Set(payload.stock_quantity),
        seller_id: Set(user.user_id),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    insert_images(&txn, product.id, &payload.images).await?;
    let images = ProductImages::find()
        .filter(ImageCol::ProductId.eq(product.id))
        .all(&txn)
        .await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        AuditAction::ProductCreate,
        serde_json::json!({ "product_id": product.id }),
    )
    .await;
    tracing::info!(product_id = %product.id, seller_id = %user.user_id, "product created");

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product, images),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    payload.validate()?;
    let txn = state.orm.begin().await?;

    let existing = Products::find_by_id(id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner_or_admin(user, existing.seller_id)?;

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(category) = payload.category {
        active.category = Set(category.trim().to_string());
    }
    if let Some(condition) = payload.condition {
        active.condition = Set(condition);
    }
    if let Some(stock_quantity) = payload.stock_quantity {
        active.stock_quantity = Set(stock_quantity);
    }
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    let images_replaced = payload.images.is_some();
    if let Some(images) = payload.images {
        ProductImages::delete_many()
            .filter(ImageCol::ProductId.eq(product.id))
            .exec(&txn)
            .await?;
        insert_images(&txn, product.id, &images).await?;
    }

    let images = ProductImages::find()
        .filter(ImageCol::ProductId.eq(product.id))
        .all(&txn)
        .await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        AuditAction::ProductUpdate,
        serde_json::json!({ "product_id": product.id, "images_replaced": images_replaced }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product, images),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner_or_admin(user, existing.seller_id)?;

    // order_items.product_id is ON DELETE RESTRICT, so a sold product fails here atomically.
    let result = Products::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(conflict_on_order_history)?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        AuditAction::ProductDelete,
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn add_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    payload.validate()?;
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if product.seller_id == user.user_id {
        return Err(AppError::BadRequest(
            "Sellers cannot review their own products".into(),
        ));
    }

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        author_id: Set(user.user_id),
        rating: Set(payload.rating),
        comment: Set(payload
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Review created",
        Review::from(review),
        Some(Meta::empty()),
    ))
}

fn conflict_on_order_history(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
            AppError::Conflict("Product has order history and cannot be deleted".into())
        }
        _ => AppError::OrmError(err),
    }
}

async fn insert_images<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    urls: &[String],
) -> AppResult<()> {
    if urls.is_empty() {
        return Ok(());
    }
    let models = urls.iter().enumerate().map(|(position, url)| ImageActive {
        id: Set(Uuid::new_v4()),
        url: Set(url.trim().to_string()),
        position: Set(position as i32),
        product_id: Set(product_id),
    });
    ProductImages::insert_many(models).exec(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::sea_orm_active_enums::ProductCondition;
    use rust_decimal_macros::dec;
    use sea_orm::{DbBackend, QueryTrait};

    fn sql(query: &ProductQuery) -> String {
        product_finder(query).build(DbBackend::Postgres).to_string()
    }

    fn unfiltered(sql: &str) -> bool {
        !sql.contains("ILIKE")
            && !sql.contains(r#""category" ="#)
            && !sql.contains(r#""price" >"#)
            && !sql.contains(r#""price" <"#)
            && !sql.contains(r#""seller_id" ="#)
    }

    #[test]
    fn empty_query_applies_no_filters() {
        let sql = sql(&ProductQuery::default());
        assert!(unfiltered(&sql), "{sql}");
        assert!(sql.contains(r#"ORDER BY "products"."created_at" DESC"#), "{sql}");
    }

    #[test]
    fn search_matches_title_or_description_case_insensitively() {
        let sql = sql(&ProductQuery {
            search: Some("carbon".into()),
            ..Default::default()
        });
        assert!(sql.contains(r#""title" ILIKE '%carbon%'"#), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
        assert!(sql.contains(r#""description" ILIKE '%carbon%'"#), "{sql}");
    }

    #[test]
    fn blank_search_and_category_are_ignored() {
        let sql = sql(&ProductQuery {
            search: Some("   ".into()),
            category: Some(String::new()),
            ..Default::default()
        });
        assert!(unfiltered(&sql), "{sql}");
    }

    #[test]
    fn price_range_is_inclusive_and_may_be_one_sided() {
        let both = sql(&ProductQuery {
            min_price: Some(dec!(20)),
            max_price: Some(dec!(100)),
            ..Default::default()
        });
        assert!(both.contains(r#""price" >= 20"#), "{both}");
        assert!(both.contains(r#""price" <= 100"#), "{both}");

        let min_only = sql(&ProductQuery {
            min_price: Some(dec!(20)),
            ..Default::default()
        });
        assert!(min_only.contains(r#""price" >= 20"#), "{min_only}");
        assert!(!min_only.contains(r#""price" <="#), "{min_only}");
    }

    #[test]
    fn category_and_condition_are_exact_matches() {
        let sql = sql(&ProductQuery {
            category: Some("Rackets".into()),
            condition: Some(ProductCondition::Used),
            ..Default::default()
        });
        assert!(sql.contains(r#""category" = 'Rackets'"#), "{sql}");
        assert!(sql.contains("'USED'"), "{sql}");
        assert!(sql.contains(" AND "), "{sql}");
    }

    #[test]
    fn wildcards_in_search_are_escaped() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn other_delete_failures_stay_internal() {
        let err = conflict_on_order_history(DbErr::Custom("connection reset".into()));
        assert!(matches!(err, AppError::OrmError(_)));
    }
}
