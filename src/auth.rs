use std::future::{ready, Ready};

use actix_web::{http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use subtle::ConstantTimeEq;

use crate::{
    config::Token,
    error::{Error, UploadError},
    repo::UserId,
};

/// Resolves bearer tokens to the user they were issued for
#[derive(Clone)]
pub(crate) struct Authenticator {
    tokens: Vec<(Vec<u8>, UserId)>,
}

impl Authenticator {
    pub(crate) fn new(tokens: &[Token]) -> Self {
        Authenticator {
            tokens: tokens
                .iter()
                .map(|Token { token, user_id }| {
                    (token.as_bytes().to_vec(), UserId::from(*user_id))
                })
                .collect(),
        }
    }

    /// Every configured token is compared so timing doesn't reveal which one was closest
    pub(crate) fn authenticate(&self, presented: &str) -> Option<UserId> {
        let presented = presented.as_bytes();

        let mut found = None;

        for (token, user_id) in &self.tokens {
            if token.len() == presented.len() && bool::from(token.ct_eq(presented)) {
                found = Some(*user_id);
            }
        }

        found
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;

    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    Some(token.trim())
}

/// The authenticated caller of a request
#[derive(Clone, Copy, Debug)]
pub(crate) struct Requester(pub(crate) UserId);

impl FromRequest for Requester {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let res = req
            .app_data::<web::Data<Authenticator>>()
            .zip(bearer(req))
            .and_then(|(authenticator, token)| authenticator.authenticate(token))
            .map(Requester)
            .ok_or_else(|| UploadError::Unauthenticated.into());

        ready(res)
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{http::header::AUTHORIZATION, test::TestRequest, web, FromRequest};

    use super::{Authenticator, Requester};
    use crate::{config::Token, repo::UserId};

    const ALICE: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";
    const BOB: &str = "0b5d6f2e-9d8a-4c1e-8f3b-2a7c6e5d4f10";

    fn authenticator() -> Authenticator {
        Authenticator::new(&[
            Token {
                token: String::from("alice-token"),
                user_id: ALICE.parse().unwrap(),
            },
            Token {
                token: String::from("bob-token"),
                user_id: BOB.parse().unwrap(),
            },
        ])
    }

    #[test]
    fn known_tokens_resolve() {
        let auth = authenticator();

        assert_eq!(
            auth.authenticate("alice-token"),
            Some(UserId::from(ALICE.parse::<uuid::Uuid>().unwrap()))
        );
        assert_eq!(
            auth.authenticate("bob-token"),
            Some(UserId::from(BOB.parse::<uuid::Uuid>().unwrap()))
        );
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        let auth = authenticator();

        for token in ["", "alice", "alice-token2", "ALICE-TOKEN"] {
            assert_eq!(auth.authenticate(token), None, "{token}");
        }
    }

    #[actix_web::test]
    async fn requester_from_bearer_header() {
        let req = TestRequest::default()
            .app_data(web::Data::new(authenticator()))
            .insert_header((AUTHORIZATION, "Bearer bob-token"))
            .to_http_request();

        let Requester(user_id) = Requester::extract(&req).await.unwrap();

        assert_eq!(user_id.to_string(), BOB);
    }

    #[actix_web::test]
    async fn requester_missing_header() {
        let req = TestRequest::default()
            .app_data(web::Data::new(authenticator()))
            .to_http_request();

        let err = Requester::extract(&req).await.unwrap_err();

        assert_eq!(err.error_code().as_str(), "unauthenticated");
    }

    #[actix_web::test]
    async fn requester_wrong_scheme() {
        let req = TestRequest::default()
            .app_data(web::Data::new(authenticator()))
            .insert_header((AUTHORIZATION, "Basic alice-token"))
            .to_http_request();

        assert!(Requester::extract(&req).await.is_err());
    }
}
