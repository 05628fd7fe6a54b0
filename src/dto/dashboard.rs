use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::sea_orm_active_enums::OrderStatus,
    models::{Order, OrderItem, Product},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[schema(value_type = f64)]
    pub total_spent: Decimal,
    pub active_orders: i64,
    #[schema(value_type = f64)]
    pub total_earnings: Decimal,
    pub active_listings: i64,
    pub items_sold: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemWithProduct {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product: Option<Product>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentOrder {
    #[serde(flatten)]
    pub order: Order,
    pub order_items: Vec<OrderItemWithProduct>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleBuyer {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleOrder {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub buyer: SaleBuyer,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentSale {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product: Option<Product>,
    pub order: SaleOrder,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub recent_orders: Vec<RecentOrder>,
    pub recent_sales: Vec<RecentSale>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_serialize_as_zeroes() {
        let json = serde_json::to_value(DashboardStats::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "totalSpent": 0.0,
                "activeOrders": 0,
                "totalEarnings": 0.0,
                "activeListings": 0,
                "itemsSold": 0
            })
        );
    }
}
