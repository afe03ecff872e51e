use store::{Order, OrderLine};

use super::{OrderItemView, OrderView};

/// Maps stored orders to their views.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderMapper;

impl OrderMapper {
    pub fn to_view(order: &Order, lines: &[OrderLine]) -> OrderView {
        OrderView {
            id: order.id,
            order_number: order.order_number.clone(),
            status: order.status,
            total_amount: order.total_amount,
            shipping_address: order.shipping_address.clone(),
            notes: order.notes.clone(),
            created_at: order.created_at,
            items: lines.iter().map(Self::to_item_view).collect(),
        }
    }

    pub fn to_item_view(line: &OrderLine) -> OrderItemView {
        OrderItemView {
            id: line.item.id,
            product_id: line.item.product_id,
            product_name: line.product_name.clone(),
            quantity: line.item.quantity,
            unit_price: line.item.unit_price,
            total_price: line.item.total_price,
        }
    }
}
