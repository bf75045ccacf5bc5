use serde::{Deserialize, Serialize};

/// Token claims issued by the identity service. This core only consumes
/// them; sign-in flows live elsewhere.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Claims {
    pub id: String, // user UUID as a string
    pub email: String,
    pub exp: usize, // expiration (as UNIX timestamp)
}
