use crate::commands::common::{
    format_product_lines, open_catalog, product_to_item, AppContext, ProductItem,
};
use crate::error::CliError;

pub async fn run_list(all: bool, as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let catalog = open_catalog(ctx, false).await?;
    let products = if all {
        catalog.list_all().await?
    } else {
        catalog.list().await?
    };

    if as_json {
        let json_items = products
            .iter()
            .map(product_to_item)
            .collect::<Vec<ProductItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if products.is_empty() {
        println!("No products.");
    } else {
        for line in format_product_lines(&products) {
            println!("{line}");
        }
    }

    Ok(())
}
