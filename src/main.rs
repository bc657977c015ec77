//! Storefront CLI: sign in, inspect identity, browse the catalog and
//! publish products against the hosted backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use vitrina::config::StoreConfig;
use vitrina::net::backend::{CredentialError, SessionClient, SessionError};
use vitrina::net::rest::RestClient;
use vitrina::services::catalog::{self, CatalogError};
use vitrina::services::products::{self, ImageUpload, NewProduct, ProductError};
use vitrina::services::profile::ProfileFetcher;
use vitrina::state::auth::{AuthContainer, AuthSnapshot};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing configuration; set VITRINA_API_URL and VITRINA_ANON_KEY")]
    MissingConfig,
    #[error("sign-in failed: {0}")]
    SignIn(#[from] CredentialError),
    #[error("session check failed: {0}")]
    Session(#[from] SessionError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Product(#[from] ProductError),
    #[error("admin access required; sign in with an admin account first")]
    NotAdmin,
    #[error("could not read image {path}: {source}")]
    ImageRead { path: PathBuf, source: std::io::Error },
}

#[derive(Parser, Debug)]
#[command(name = "vitrina", about = "Storefront client for the hosted backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email/password and print the access token for reuse
    /// via `VITRINA_ACCESS_TOKEN`.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Show the current identity and role.
    Whoami,
    /// List the public product catalog.
    Catalog,
    Product(ProductCommand),
}

#[derive(Args, Debug)]
struct ProductCommand {
    #[command(subcommand)]
    command: ProductSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProductSubcommand {
    /// Create a product, optionally uploading an image first.
    /// Requires an admin session.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        price: f64,
        #[arg(long, default_value_t = 0)]
        stock: i64,
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = StoreConfig::from_env().ok_or(CliError::MissingConfig)?;
    let client = Arc::new(RestClient::new(&config));

    match cli.command {
        Command::Login { email, password } => run_login(&client, &email, &password).await,
        Command::Whoami => run_whoami(&client).await,
        Command::Catalog => run_catalog(&client).await,
        Command::Product(product) => match product.command {
            ProductSubcommand::Create { name, description, price, stock, image } => {
                let new_product = NewProduct { name, description, price, stock };
                run_product_create(&client, new_product, image).await
            }
        },
    }
}

async fn run_login(client: &Arc<RestClient>, email: &str, password: &str) -> Result<(), CliError> {
    client.sign_in(email, password).await?;
    let Some(session) = client.current_session().await? else {
        // Sign-in succeeded, so a session must exist; reaching this means
        // the backend dropped it in between.
        return Err(CliError::Session(SessionError::Malformed("no session after sign-in".to_owned())));
    };
    println!("signed in as {}", session.user.email.as_deref().unwrap_or("<no email>"));
    println!("export VITRINA_ACCESS_TOKEN={}", session.access_token);
    Ok(())
}

async fn run_whoami(client: &Arc<RestClient>) -> Result<(), CliError> {
    let container = build_container(client);
    container.initialize().await;
    let snapshot = settled_snapshot(&container).await;
    container.shutdown();

    match (&snapshot.user, &snapshot.profile) {
        (Some(user), Some(profile)) => {
            println!("user:  {}", user.email.as_deref().unwrap_or("<no email>"));
            println!("name:  {}", profile.display_name.as_deref().unwrap_or("-"));
            println!("admin: {}", if snapshot.is_admin() { "yes" } else { "no" });
        }
        _ => println!("anonymous"),
    }
    Ok(())
}

async fn run_catalog(client: &Arc<RestClient>) -> Result<(), CliError> {
    let products = catalog::list_products(client.as_ref()).await?;
    if products.is_empty() {
        println!("catalog is empty");
        return Ok(());
    }
    for product in products {
        println!(
            "{:>5}  {:<30} ${:<9.2} stock {:<5} {}",
            product.id,
            product.name,
            product.price,
            product.stock,
            product.image_url.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn run_product_create(
    client: &Arc<RestClient>,
    new_product: NewProduct,
    image: Option<PathBuf>,
) -> Result<(), CliError> {
    let container = build_container(client);
    container.initialize().await;
    let snapshot = settled_snapshot(&container).await;
    container.shutdown();
    if !snapshot.is_admin() {
        return Err(CliError::NotAdmin);
    }

    let image = image.map(|path| read_image(&path)).transpose()?;
    let created =
        products::create_product(client.as_ref(), client.as_ref(), &new_product, image).await?;
    println!("created product {} ({})", created.id, created.name);
    if let Some(url) = created.image_url {
        println!("image: {url}");
    }
    Ok(())
}

fn build_container(client: &Arc<RestClient>) -> AuthContainer {
    AuthContainer::new(client.clone(), ProfileFetcher::new(client.clone()))
}

/// Wait for the container to leave its loading window.
async fn settled_snapshot(container: &AuthContainer) -> AuthSnapshot {
    let mut rx = container.subscribe();
    loop {
        {
            let snapshot = rx.borrow_and_update();
            if !snapshot.loading {
                return snapshot.clone();
            }
        }
        if rx.changed().await.is_err() {
            return container.snapshot();
        }
    }
}

fn read_image(path: &Path) -> Result<ImageUpload, CliError> {
    let bytes = std::fs::read(path)
        .map_err(|source| CliError::ImageRead { path: path.to_path_buf(), source })?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image.bin")
        .to_owned();
    Ok(ImageUpload { file_name, content_type: content_type_for(path).to_owned(), bytes })
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
