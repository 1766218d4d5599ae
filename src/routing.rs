//! Natural-language routing onto generated SQL.
//!
//! [`NlRouter`] classifies a request with the ordered rules in [`intent`],
//! resolves entity categories to candidate tables with [`resolver`] and
//! generates statements with [`builder`]. Everything it runs goes through the
//! [`ConnectionManager`](crate::database::ConnectionManager).

pub mod builder;
mod category;
pub mod intent;
pub mod resolver;
mod router;

pub use builder::{QueryBuilder, QueryPlan};
pub use category::EntityCategory;
pub use intent::{classify, Intent, IntentKind, IntentRule, ParsedRequest, INTENT_RULES};
pub use resolver::find_candidate_tables;
pub use router::{EntityLookup, NlRouter, RouteOutcome, RoutedQuery};
