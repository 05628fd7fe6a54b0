use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse,
            ResetPasswordRequest, SignupRequest, UpdateProfileRequest,
        },
        dashboard::{
            DashboardStats, OrderItemWithProduct, RecentActivity, RecentOrder, RecentSale,
            SaleBuyer, SaleOrder,
        },
        products::{CreateProductRequest, CreateReviewRequest, ProductList, UpdateProductRequest},
        upload::UploadResponse,
    },
    entity::sea_orm_active_enums::{OrderStatus, ProductCondition, UserRole},
    models::{
        Order, OrderItem, Product, ProductDetail, ProductImage, ProductWithSeller, Profile,
        Review, Seller, UserSummary,
    },
    response::{ApiResponse, Meta},
    routes::{auth, dashboard, health, products as product_routes, upload},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::signup,
        auth::login,
        auth::forgot_password,
        auth::reset_password,
        auth::get_profile,
        auth::update_profile,
        product_routes::list_products,
        product_routes::create_product,
        product_routes::get_product,
        product_routes::update_product,
        product_routes::delete_product,
        product_routes::add_review,
        dashboard::get_stats,
        dashboard::get_recent_activity,
        upload::upload_files
    ),
    components(
        schemas(
            UserRole,
            ProductCondition,
            OrderStatus,
            UserSummary,
            Profile,
            Seller,
            Product,
            ProductImage,
            ProductWithSeller,
            ProductDetail,
            Review,
            Order,
            OrderItem,
            SignupRequest,
            LoginRequest,
            AuthResponse,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            MessageResponse,
            UpdateProfileRequest,
            CreateProductRequest,
            UpdateProductRequest,
            CreateReviewRequest,
            ProductList,
            DashboardStats,
            OrderItemWithProduct,
            RecentOrder,
            SaleBuyer,
            SaleOrder,
            RecentSale,
            RecentActivity,
            UploadResponse,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<ProductDetail>,
            ApiResponse<AuthResponse>,
            ApiResponse<Profile>,
            ApiResponse<DashboardStats>,
            ApiResponse<RecentActivity>,
            ApiResponse<UploadResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Signup, login, password reset and profile"),
        (name = "Products", description = "Catalog search and listing management"),
        (name = "Dashboard", description = "Buyer and seller statistics"),
        (name = "Upload", description = "Product image upload"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
