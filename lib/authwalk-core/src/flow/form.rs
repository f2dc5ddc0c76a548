use http::Method;
use scraper::{ElementRef, Html};
use url::Url;

use super::config::Credentials;

/// Errors raised while turning an HTML form into a request.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum FormError {
    /// The form declares a method other than `GET` or `POST`.
    #[display("Unsupported form method: {method}")]
    #[from(skip)]
    UnsupportedMethod {
        /// The declared method.
        method: String,
    },

    /// The form action cannot be resolved against the page URL.
    #[display("Invalid form action '{action}': {source}")]
    #[from(skip)]
    InvalidAction {
        /// The declared action.
        action: String,
        /// The resolution error.
        source: url::ParseError,
    },

    /// The form fields cannot be URL-encoded.
    #[display("Cannot encode form fields: {_0}")]
    Encoding(serde_urlencoded::ser::Error),
}

/// An input-like element of a form, with its attributes already extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    /// Lower-cased `type` attribute, `textarea` for text areas, empty when absent.
    pub kind: String,
    /// The `name` attribute.
    pub name: String,
    /// The `value` attribute, or the text of a text area.
    pub value: Option<String>,
    /// Presence of the `checked` attribute.
    pub checked: bool,
}

/// A `<form>` element found in a page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HtmlForm {
    /// The `method` attribute, as written.
    pub method: Option<String>,
    /// The `action` attribute, as written.
    pub action: Option<String>,
    /// Named fields, in document order.
    pub fields: Vec<FormField>,
}

/// Collects every `<form>` element of an HTML document.
///
/// Parsing is lenient, like a browser's: malformed markup yields whatever
/// forms the parser recovers, possibly none.
pub fn extract_forms(html: &str) -> Vec<HtmlForm> {
    let document = Html::parse_document(html);
    elements_named(document.root_element(), "form")
        .map(HtmlForm::from_element)
        .collect()
}

fn elements_named<'a>(
    root: ElementRef<'a>,
    tag: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    root.descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |element| element.value().name() == tag)
}

impl HtmlForm {
    fn from_element(form: ElementRef<'_>) -> Self {
        let mut fields = Vec::new();
        for element in form.descendants().filter_map(ElementRef::wrap) {
            let attrs = element.value();
            let Some(name) = attrs.attr("name") else {
                continue;
            };
            match attrs.name() {
                "input" => fields.push(FormField {
                    kind: attrs.attr("type").unwrap_or_default().to_ascii_lowercase(),
                    name: name.to_string(),
                    value: attrs.attr("value").map(ToString::to_string),
                    checked: attrs.attr("checked").is_some(),
                }),
                "textarea" => fields.push(FormField {
                    kind: "textarea".to_string(),
                    name: name.to_string(),
                    value: Some(element.text().collect()),
                    checked: false,
                }),
                _ => {}
            }
        }

        Self {
            method: form.value().attr("method").map(ToString::to_string),
            action: form.value().attr("action").map(ToString::to_string),
            fields,
        }
    }

    /// Builds the submission a browser would send for this form.
    ///
    /// - the method defaults to `GET`, the action to the current page;
    /// - `text`/`password` inputs named `username`/`password` are filled
    ///   from `credentials` when given, whatever their value;
    /// - `checkbox` and `radio` inputs are sent only when `checked`, with
    ///   `on` as default value;
    /// - only the first `submit` input is sent;
    /// - other inputs without a value are skipped, text areas send their text.
    ///
    /// # Errors
    ///
    /// Fails on methods other than `GET`/`POST` and on unresolvable actions.
    pub fn submission(
        &self,
        current_url: &Url,
        credentials: Option<&Credentials>,
    ) -> Result<FormSubmission, FormError> {
        let method = match self.method.as_deref().map(str::trim) {
            None | Some("") => Method::GET,
            Some(method) if method.eq_ignore_ascii_case("get") => Method::GET,
            Some(method) if method.eq_ignore_ascii_case("post") => Method::POST,
            Some(method) => {
                return Err(FormError::UnsupportedMethod {
                    method: method.to_string(),
                });
            }
        };

        let action = self.action.as_deref().unwrap_or_default();
        let url = current_url
            .join(action)
            .map_err(|source| FormError::InvalidAction {
                action: action.to_string(),
                source,
            })?;

        let mut fields = Vec::new();
        let mut added_submit = false;
        for field in &self.fields {
            let value = match (field.kind.as_str(), field.name.as_str(), credentials) {
                ("text" | "password", "username", Some(credentials)) => {
                    Some(credentials.username.clone())
                }
                ("text" | "password", "password", Some(credentials)) => {
                    Some(credentials.password.as_str().to_string())
                }
                ("checkbox" | "radio", _, _) => field
                    .checked
                    .then(|| field.value.clone().unwrap_or_else(|| "on".to_string())),
                ("submit", _, _) if !added_submit => {
                    added_submit = field.value.is_some();
                    field.value.clone()
                }
                ("hidden" | "text" | "password" | "" | "textarea", _, _) => field.value.clone(),
                _ => None,
            };
            if let Some(value) = value {
                fields.push((field.name.clone(), value));
            }
        }

        Ok(FormSubmission {
            method,
            url,
            fields,
        })
    }
}

/// The request produced by submitting a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    /// Submission method, `GET` or `POST`.
    pub method: Method,
    /// Resolved action URL.
    pub url: Url,
    /// Submitted name/value pairs, in document order.
    pub fields: Vec<(String, String)>,
}

impl FormSubmission {
    /// Target URL: for `GET` the fields are appended to the action's query.
    pub fn target(&self) -> Url {
        let mut url = self.url.clone();
        if self.method == Method::GET && !self.fields.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.fields);
        }
        url
    }

    /// Encoded body: the fields for `POST`, nothing for `GET`.
    ///
    /// # Errors
    ///
    /// Fails if the fields cannot be encoded.
    pub fn body(&self) -> Result<Option<String>, FormError> {
        if self.method == Method::POST {
            Ok(Some(serde_urlencoded::to_string(&self.fields)?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPROVE_PAGE: &str = r#"
        <!DOCTYPE html>
        <html>
          <body>
            <form method="post" action="approve">
              <input type="hidden" name="then" value="/oauth/authorize?client_id=x">
              <input type="hidden" name="csrf" value="abc">
              <input type="checkbox" name="scope" value="user:info" checked>
              <input type="checkbox" name="scope" value="user:full">
              <input type="text" name="comment">
              <input type="submit" name="approve" value="Allow selected permissions">
              <input type="submit" name="deny" value="Deny">
            </form>
          </body>
        </html>
    "#;

    fn page_url() -> Url {
        Url::parse("http://127.0.0.1:8443/oauth/authorize/consent?then=x").expect("url")
    }

    #[test]
    fn should_find_all_forms() {
        let html = "<form></form><div><form action='/a'></form></div><p>no form</p>";

        let forms = extract_forms(html);

        assert_eq!(forms.len(), 2);
        assert_eq!(forms.get(1).and_then(|form| form.action.as_deref()), Some("/a"));
    }

    #[test]
    fn should_find_no_form_in_plain_page() {
        assert!(extract_forms("").is_empty());
        assert!(extract_forms("<html><body>OK</body></html>").is_empty());
    }

    #[test]
    fn should_build_post_submission_with_first_submit_only() {
        let forms = extract_forms(APPROVE_PAGE);
        let [form] = forms.as_slice() else {
            panic!("expected one form, got {forms:?}");
        };

        let submission = form.submission(&page_url(), None).expect("valid form");

        assert_eq!(submission.method, Method::POST);
        assert_eq!(
            submission.url.as_str(),
            "http://127.0.0.1:8443/oauth/authorize/approve"
        );
        let body = submission.body().expect("encodable").expect("post body");
        insta::assert_snapshot!(body, @"then=%2Foauth%2Fauthorize%3Fclient_id%3Dx&csrf=abc&scope=user%3Ainfo&approve=Allow+selected+permissions");
    }

    #[test]
    fn should_default_to_get_on_current_page() {
        let forms = extract_forms(
            r#"<form><input name="step" value="2"><input type="submit" value="go"></form>"#,
        );
        let [form] = forms.as_slice() else {
            panic!("expected one form, got {forms:?}");
        };

        let submission = form.submission(&page_url(), None).expect("valid form");

        assert_eq!(submission.method, Method::GET);
        assert_eq!(
            submission.target().as_str(),
            "http://127.0.0.1:8443/oauth/authorize/consent?then=x&step=2"
        );
        assert_eq!(submission.body().expect("encodable"), None);
    }

    #[test]
    fn should_fill_login_fields_from_credentials() {
        let forms = extract_forms(
            r#"<form method="POST" action="/login">
                 <input type="text" name="username" value="">
                 <input type="password" name="password" value="">
                 <textarea name="note">hello</textarea>
               </form>"#,
        );
        let [form] = forms.as_slice() else {
            panic!("expected one form, got {forms:?}");
        };
        let credentials = Credentials::new("harold", "any-pass");

        let submission = form
            .submission(&page_url(), Some(&credentials))
            .expect("valid form");

        assert_eq!(
            submission.fields,
            vec![
                ("username".to_string(), "harold".to_string()),
                ("password".to_string(), "any-pass".to_string()),
                ("note".to_string(), "hello".to_string()),
            ]
        );
    }

    #[test]
    fn should_fill_login_fields_without_value_attribute() {
        let forms = extract_forms(
            r#"<form method="post" action="/login">
                 <input type="text" name="username">
                 <input type="password" name="password">
               </form>"#,
        );
        let [form] = forms.as_slice() else {
            panic!("expected one form, got {forms:?}");
        };
        let credentials = Credentials::new("harold", "any-pass");

        let filled = form
            .submission(&page_url(), Some(&credentials))
            .expect("valid form");
        let anonymous = form.submission(&page_url(), None).expect("valid form");

        assert_eq!(
            filled.fields,
            vec![
                ("username".to_string(), "harold".to_string()),
                ("password".to_string(), "any-pass".to_string()),
            ]
        );
        assert!(anonymous.fields.is_empty());
    }

    #[test]
    fn should_only_send_checked_choices() {
        let forms = extract_forms(
            r#"<form>
                 <input type="checkbox" name="scope" value="user:info" checked>
                 <input type="checkbox" name="scope" value="user:full">
                 <input type="checkbox" name="remember" checked>
                 <input type="radio" name="duration" value="hour">
                 <input type="radio" name="duration" value="day" checked>
               </form>"#,
        );
        let [form] = forms.as_slice() else {
            panic!("expected one form, got {forms:?}");
        };

        let submission = form.submission(&page_url(), None).expect("valid form");

        assert_eq!(
            submission.fields,
            vec![
                ("scope".to_string(), "user:info".to_string()),
                ("remember".to_string(), "on".to_string()),
                ("duration".to_string(), "day".to_string()),
            ]
        );
    }

    #[test]
    fn should_reject_unsupported_method() {
        let forms = extract_forms(r#"<form method="dialog"></form>"#);
        let [form] = forms.as_slice() else {
            panic!("expected one form, got {forms:?}");
        };

        let result = form.submission(&page_url(), None);

        assert!(matches!(
            result,
            Err(FormError::UnsupportedMethod { method }) if method == "dialog"
        ));
    }

    #[test]
    fn should_reject_unresolvable_action() {
        let forms = extract_forms(r#"<form action="http://[::1"></form>"#);
        let [form] = forms.as_slice() else {
            panic!("expected one form, got {forms:?}");
        };

        let result = form.submission(&page_url(), None);

        assert!(matches!(result, Err(FormError::InvalidAction { .. })));
    }
}
