use axum::{
    Router,
    routing::{get, post, put},
};

pub mod area;
pub mod item;
pub mod stock;
pub mod system;
pub mod tag;

/// Router for every resource endpoint.
pub fn router() -> Router {
    Router::new()
        .route(
            "/item",
            put(item::create_item)
                .get(item::find_items)
                .patch(item::update_item),
        )
        .route("/item/history", get(item::item_history))
        .route(
            "/tag",
            put(tag::create_tag).get(tag::find_tags).delete(tag::delete_tag),
        )
        .route(
            "/area",
            put(area::create_area)
                .get(area::find_areas)
                .patch(area::move_area)
                .delete(area::delete_area),
        )
        .route("/updateStock", post(stock::update_stock))
}
