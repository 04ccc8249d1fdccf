use serde::Deserialize;

/// Response from the GitHub Search Users API (`/search/users`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResponse {
    pub total_count: u64,
    pub items: Vec<UserSummary>,
}

/// A single user item from the search results.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserSummary {
    pub id: u64,
    pub login: String,
    pub avatar_url: String,
}

/// A repository from the `/users/{login}/repos` API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositorySummary {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub stargazers_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_ignores_extra_fields() {
        let body = r#"{
            "total_count": 1,
            "incomplete_results": false,
            "items": [
                {"login": "octocat", "id": 583231, "avatar_url": "https://a/u/583231", "type": "User"}
            ]
        }"#;

        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.total_count, 1);
        assert_eq!(parsed.items[0].login, "octocat");
        assert_eq!(parsed.items[0].id, 583231);
    }

    #[test]
    fn repository_description_may_be_null() {
        let body = r#"[{"id": 10, "name": "repo-a", "description": null, "stargazers_count": 3, "fork": false}]"#;

        let parsed: Vec<RepositorySummary> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed[0].description, None);
        assert_eq!(parsed[0].stargazers_count, 3);
    }
}
