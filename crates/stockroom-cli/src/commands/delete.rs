use stockroom_core::Error;

use crate::commands::common::{describe_delivery, normalize_product_id, open_catalog, AppContext};
use crate::error::CliError;

pub async fn run_delete(id: &str, ctx: &AppContext) -> Result<(), CliError> {
    let id = normalize_product_id(id)?;
    let catalog = open_catalog(ctx, false).await?;

    let outcome = match catalog.delete(&id).await {
        Ok(outcome) => outcome,
        Err(Error::NotFound(_)) => return Err(CliError::ProductNotFound(id.to_string())),
        Err(error) => return Err(error.into()),
    };

    println!("{}", outcome.product.id);
    eprintln!("{}", describe_delivery(&outcome.delivery));
    Ok(())
}
