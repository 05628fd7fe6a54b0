use anyhow::Context;
use pickleball_marketplace_api::{
    db::{DbPool, create_pool, run_migrations},
    entity::sea_orm_active_enums::{OrderStatus, ProductCondition, UserRole},
    services::auth_service::hash_password,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

struct SeedProduct {
    title: &'static str,
    description: &'static str,
    price: Decimal,
    category: &'static str,
    condition: ProductCondition,
    stock_quantity: i32,
    image: &'static str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

    let pool = create_pool(&database_url, 2).await?;
    run_migrations(&pool).await?;

    let seller_id = ensure_user(
        &pool,
        "seller@pickleball.com",
        "seller-password",
        ("Pro", "Seller"),
        UserRole::Seller,
    )
    .await?;
    let buyer_id = ensure_user(
        &pool,
        "buyer@pickleball.com",
        "buyer-password",
        ("Casual", "Buyer"),
        UserRole::Buyer,
    )
    .await?;
    ensure_user(
        &pool,
        "admin@pickleball.com",
        "admin-password",
        ("Site", "Admin"),
        UserRole::Admin,
    )
    .await?;

    let product_ids = seed_products(&pool, seller_id).await?;
    seed_orders(&pool, buyer_id, &product_ids).await?;

    pool.close().await;
    println!("Seed completed. Seller ID: {seller_id}, Buyer ID: {buyer_id}");
    Ok(())
}

async fn ensure_user(
    pool: &DbPool,
    email: &str,
    password: &str,
    (first_name, last_name): (&str, &str),
    role: UserRole,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, first_name, last_name, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(first_name)
    .bind(last_name)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role:?})");
    Ok(id)
}

fn catalog() -> Vec<SeedProduct> {
    vec![
        SeedProduct {
            title: "Pro Carbon Paddle",
            description: "High performance carbon fiber paddle for advanced players.",
            price: dec!(149.99),
            category: "Rackets",
            condition: ProductCondition::New,
            stock_quantity: 10,
            image: "https://images.unsplash.com/photo-1626246939893-02f81057f6a3?w=500&auto=format&fit=crop&q=60&ixlib=rb-4.0.3",
        },
        SeedProduct {
            title: "Outdoor Pickleballs (3-Pack)",
            description: "Durable outdoor balls, USAPA approved.",
            price: dec!(9.99),
            category: "Balls",
            condition: ProductCondition::New,
            stock_quantity: 100,
            image: "https://images.unsplash.com/photo-1599474924187-334a4ae5bd3c?w=500&auto=format&fit=crop&q=60&ixlib=rb-4.0.3",
        },
        SeedProduct {
            title: "Vintage Wooden Paddle",
            description: "Classic wooden paddle, great for beginners or collectors.",
            price: dec!(29.99),
            category: "Rackets",
            condition: ProductCondition::Used,
            stock_quantity: 1,
            image: "https://plus.unsplash.com/premium_photo-1677171749302-e77091963571?w=500&auto=format&fit=crop&q=60&ixlib=rb-4.0.3",
        },
    ]
}

/// Insert the sample catalog once; products are matched by title.
async fn seed_products(pool: &DbPool, seller_id: Uuid) -> anyhow::Result<Vec<(Uuid, Decimal)>> {
    let mut ids = Vec::new();
    for product in catalog() {
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM products WHERE title = $1 AND seller_id = $2")
                .bind(product.title)
                .bind(seller_id)
                .fetch_optional(pool)
                .await?;
        if let Some((id,)) = existing {
            ids.push((id, product.price));
            continue;
        }

        let mut tx = pool.begin().await?;
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO products (id, title, description, price, category, condition, stock_quantity, seller_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(product.title)
        .bind(product.description)
        .bind(product.price)
        .bind(product.category)
        .bind(product.condition)
        .bind(product.stock_quantity)
        .bind(seller_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO product_images (id, url, position, product_id) VALUES ($1, $2, 0, $3)")
            .bind(Uuid::new_v4())
            .bind(product.image)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        println!("Created product with id: {id}");
        ids.push((id, product.price));
    }
    Ok(ids)
}

/// Two sample orders so the dashboards have something to show. Skipped if the buyer already has orders.
async fn seed_orders(
    pool: &DbPool,
    buyer_id: Uuid,
    products: &[(Uuid, Decimal)],
) -> anyhow::Result<()> {
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE buyer_id = $1")
        .bind(buyer_id)
        .fetch_one(pool)
        .await?;
    if existing > 0 || products.len() < 2 {
        println!("Orders already seeded");
        return Ok(());
    }

    let orders = [
        (OrderStatus::Delivered, vec![(products[0], 1), (products[1], 2)]),
        (OrderStatus::Shipped, vec![(products[1], 1)]),
    ];

    for (status, lines) in orders {
        let total: Decimal = lines
            .iter()
            .map(|((_, price), quantity)| *price * Decimal::from(*quantity))
            .sum();

        let mut tx = pool.begin().await?;
        let order_id = Uuid::new_v4();
        sqlx::query("INSERT INTO orders (id, buyer_id, total_amount, status) VALUES ($1, $2, $3, $4)")
            .bind(order_id)
            .bind(buyer_id)
            .bind(total)
            .bind(status)
            .execute(&mut *tx)
            .await?;

        for ((product_id, price), quantity) in lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, price_at_purchase)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order_id)
            .bind(product_id)
            .bind(quantity)
            .bind(price)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        println!("Created {status:?} order {order_id} totalling {total}");
    }
    Ok(())
}
