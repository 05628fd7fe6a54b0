//! Buyer and seller dashboard figures.
//!
//! Both operations are read-only. An unknown user id is not an error; it simply
//! has no orders, sales or listings and therefore yields zeroes and empty feeds.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, EntityTrait, JoinType, LoaderTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait,
};
use uuid::Uuid;

use crate::{
    dto::dashboard::{
        DashboardStats, OrderItemWithProduct, RecentActivity, RecentOrder, RecentSale, SaleBuyer,
        SaleOrder,
    },
    entity::{
        order_items::{self, Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, Entity as Orders},
        product_images::Entity as ProductImages,
        products::{Column as ProductCol, Entity as Products},
        users::{Column as UserCol, Entity as Users},
    },
    error::AppResult,
    models::{Order, OrderItem, Product, product_from_entity},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const RECENT_ACTIVITY_LIMIT: u64 = 5;

/// Buyer spend, active orders, seller earnings, items sold and live listings in one round trip.
const STATS_SQL: &str = r#"
    SELECT
        (SELECT COALESCE(SUM(o.total_amount), 0)
           FROM orders o
          WHERE o.buyer_id = $1 AND o.status <> 'CANCELLED') AS total_spent,
        (SELECT COUNT(*)
           FROM orders o
          WHERE o.buyer_id = $1 AND o.status IN ('PENDING', 'PAID', 'SHIPPED')) AS active_orders,
        sold.total_earnings,
        (SELECT COUNT(*)
           FROM products p
          WHERE p.seller_id = $1 AND p.stock_quantity > 0) AS active_listings,
        sold.items_sold
    FROM (
        SELECT COALESCE(SUM(oi.quantity * oi.price_at_purchase), 0) AS total_earnings,
               COALESCE(SUM(oi.quantity), 0)::BIGINT AS items_sold
          FROM order_items oi
          JOIN products p ON p.id = oi.product_id
          JOIN orders o ON o.id = oi.order_id
         WHERE p.seller_id = $1 AND o.status <> 'CANCELLED'
    ) AS sold
"#;

pub async fn get_stats(state: &AppState, user_id: Uuid) -> AppResult<ApiResponse<DashboardStats>> {
    let stats = sqlx::query_as::<_, DashboardStats>(STATS_SQL)
        .bind(user_id)
        .fetch_one(&state.pool)
        .await?;

    tracing::debug!(
        %user_id,
        active_orders = stats.active_orders,
        items_sold = stats.items_sold,
        "dashboard stats computed"
    );

    Ok(ApiResponse::success("Dashboard stats", stats, Some(Meta::empty())))
}

pub async fn get_recent_activity(
    state: &AppState,
    user_id: Uuid,
) -> AppResult<ApiResponse<RecentActivity>> {
    let recent_orders = recent_orders(state, user_id).await?;
    let recent_sales = recent_sales(state, user_id).await?;

    Ok(ApiResponse::success(
        "Recent activity",
        RecentActivity {
            recent_orders,
            recent_sales,
        },
        Some(Meta::empty()),
    ))
}

async fn recent_orders(state: &AppState, user_id: Uuid) -> AppResult<Vec<RecentOrder>> {
    let orders = Orders::find()
        .filter(OrderCol::BuyerId.eq(user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id)
        .limit(RECENT_ACTIVITY_LIMIT)
        .all(&state.orm)
        .await?;

    let items_per_order = orders.load_many(OrderItems, &state.orm).await?;
    let product_ids: Vec<Uuid> = items_per_order
        .iter()
        .flatten()
        .map(|item| item.product_id)
        .collect();
    let products = load_products(state, product_ids).await?;

    Ok(orders
        .into_iter()
        .zip(items_per_order)
        .map(|(order, items)| RecentOrder {
            order: Order::from(order),
            order_items: items
                .into_iter()
                .map(|item| OrderItemWithProduct {
                    product: products.get(&item.product_id).cloned(),
                    item: OrderItem::from(item),
                })
                .collect(),
        })
        .collect())
}

async fn recent_sales(state: &AppState, user_id: Uuid) -> AppResult<Vec<RecentSale>> {
    let items = OrderItems::find()
        .join(JoinType::InnerJoin, order_items::Relation::Products.def())
        .join(JoinType::InnerJoin, order_items::Relation::Orders.def())
        .filter(ProductCol::SellerId.eq(user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderItemCol::Id)
        .limit(RECENT_ACTIVITY_LIMIT)
        .all(&state.orm)
        .await?;

    let orders = items.load_one(Orders, &state.orm).await?;
    let buyers = orders
        .iter()
        .flatten()
        .map(|order| order.buyer_id)
        .collect::<Vec<_>>();
    let buyers: HashMap<Uuid, SaleBuyer> = Users::find()
        .filter(UserCol::Id.is_in(buyers))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|user| {
            (
                user.id,
                SaleBuyer {
                    first_name: user.first_name,
                    last_name: user.last_name,
                },
            )
        })
        .collect();
    let products = load_products(state, items.iter().map(|i| i.product_id).collect()).await?;

    Ok(items
        .into_iter()
        .zip(orders)
        .filter_map(|(item, order)| {
            let order = order?;
            let buyer = buyers.get(&order.buyer_id).cloned().unwrap_or(SaleBuyer {
                first_name: String::new(),
                last_name: String::new(),
            });
            Some(RecentSale {
                product: products.get(&item.product_id).cloned(),
                item: OrderItem::from(item),
                order: SaleOrder {
                    id: order.id,
                    created_at: order.created_at.with_timezone(&Utc),
                    status: order.status,
                    buyer,
                },
            })
        })
        .collect())
}

async fn load_products(state: &AppState, mut ids: Vec<Uuid>) -> AppResult<HashMap<Uuid, Product>> {
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let products = Products::find()
        .filter(ProductCol::Id.is_in(ids))
        .all(&state.orm)
        .await?;
    let images = products.load_many(ProductImages, &state.orm).await?;

    Ok(products
        .into_iter()
        .zip(images)
        .map(|(product, images)| (product.id, product_from_entity(product, images)))
        .collect())
}
