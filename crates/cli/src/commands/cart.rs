//! Cart commands.
//!
//! The cart lives in the data directory, so it survives between runs until
//! checkout or `cart clear`.

use amicale_core::records::Product;
use amicale_core::remote::Table;
use amicale_core::{LineId, ProductId};
use amicale_storefront::services::cart::{CartCandidate, CartEngine};
use amicale_storefront::state::AppState;
use clap::Subcommand;

use crate::error::CliError;
use crate::output;

#[derive(Subcommand)]
pub enum CartCommand {
    /// List the products on sale
    Catalog,
    /// Show the cart
    Show,
    /// Add a product (merges with an existing line of the same size)
    Add {
        product_id: ProductId,
        #[arg(short, long)]
        size: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Remove a line
    Remove { line_id: LineId },
    /// Change the quantity of a line (0 removes it)
    Qty { line_id: LineId, quantity: u32 },
    /// Empty the cart
    Clear,
    /// Place the order (requires --email)
    Checkout,
}

pub async fn run(state: &AppState, command: CartCommand) -> Result<(), CliError> {
    let mut cart = state.cart();
    match command {
        CartCommand::Catalog => {
            let products = Table::<Product, _>::new(state.store().as_ref())
                .find_by("is_active", true)
                .await?;
            for product in products {
                output::line(format_args!(
                    "{}  {}  {}  sizes: {}",
                    product.id,
                    product.name,
                    product.price,
                    product.sizes.join(", ")
                ));
            }
        }
        CartCommand::Show => print_cart(&cart),
        CartCommand::Add {
            product_id,
            size,
            quantity,
        } => {
            let product = Table::<Product, _>::new(state.store().as_ref())
                .find(product_id)
                .await?
                .ok_or_else(|| CliError::Usage(format!("no product {product_id}")))?;
            let candidate = CartCandidate::from_product(&product, &size, quantity)?;
            cart.add_to_cart(candidate);
            print_cart(&cart);
        }
        CartCommand::Remove { line_id } => {
            if !cart.remove_from_cart(line_id) {
                return Err(CliError::Usage(format!("no cart line {line_id}")));
            }
            print_cart(&cart);
        }
        CartCommand::Qty { line_id, quantity } => {
            if !cart.update_quantity(line_id, quantity) {
                return Err(CliError::Usage(format!("no cart line {line_id}")));
            }
            print_cart(&cart);
        }
        CartCommand::Clear => {
            cart.clear_cart();
            output::line("Cart cleared");
        }
        CartCommand::Checkout => {
            let placed = cart.checkout().await?;
            output::line(format_args!(
                "Order {} placed: {} item(s), total {}",
                placed.order.id,
                placed.items.len(),
                placed.order.total_amount
            ));
        }
    }
    Ok(())
}

fn print_cart(cart: &CartEngine) {
    if cart.lines().is_empty() {
        output::line("Cart is empty");
        return;
    }
    for line in cart.lines() {
        output::line(format_args!(
            "{}  {} ({})  {} x {} = {}",
            line.local_id,
            line.name,
            line.size,
            line.quantity,
            line.unit_price,
            line.line_total()
        ));
    }
    output::line(format_args!(
        "{} item(s), total {}",
        cart.item_count(),
        cart.total()
    ));
}
