use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use miroslava_http_models::{Method, StatusCode};

use crate::{
    Error,
    config::Config,
    ctx::{AppContext, RequestContext},
    exceptions::HttpException,
    json::{DefaultJsonProvider, JsonProvider},
    request::Request,
    response::Response,
    routing::{Map, RouteMatch, RouteOptions, Rule, UrlValue, UrlValues, allow_header},
    static_files::{self, DEFAULT_STATIC_URL_PATH},
    templating::DEFAULT_TEMPLATE_FOLDER,
    test_client::TestClient,
    view::{IntoResponse, IntoView, ResponseBody, ReturnValue, ViewArgs, ViewFunction},
};

/// Where an application finds its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppOptions {
    /// Folder of static files, relative to the root path.
    pub static_folder: Option<PathBuf>,
    /// URL prefix of static files, `static` when unset.
    pub static_url_path: Option<String>,
    /// Folder of templates, relative to the root path.
    pub template_folder: Option<PathBuf>,
    /// Defaults to the current directory.
    pub root_path: Option<PathBuf>,
    pub instance_path: Option<PathBuf>,
    /// Use the instance path as the root path.
    pub instance_relative_config: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            static_folder: Some(PathBuf::from(DEFAULT_STATIC_URL_PATH)),
            static_url_path: None,
            template_folder: Some(PathBuf::from(DEFAULT_TEMPLATE_FOLDER)),
            root_path: None,
            instance_path: None,
            instance_relative_config: false,
        }
    }
}

impl AppOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_static_folder(mut self, static_folder: Option<impl Into<PathBuf>>) -> Self {
        self.static_folder = static_folder.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_static_url_path(mut self, static_url_path: impl Into<String>) -> Self {
        self.static_url_path = Some(static_url_path.into());
        self
    }

    #[must_use]
    pub fn with_template_folder(mut self, template_folder: Option<impl Into<PathBuf>>) -> Self {
        self.template_folder = template_folder.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_root_path(mut self, root_path: impl Into<PathBuf>) -> Self {
        self.root_path = Some(root_path.into());
        self
    }

    #[must_use]
    pub fn with_instance_path(mut self, instance_path: impl Into<PathBuf>) -> Self {
        self.instance_path = Some(instance_path.into());
        self
    }

    #[must_use]
    pub const fn with_instance_relative_config(mut self, instance_relative_config: bool) -> Self {
        self.instance_relative_config = instance_relative_config;
        self
    }
}

/// The application: URL rules, their views, configuration and the glue
/// turning view return values into responses.
///
/// Register routes on a mutable app, then hand it to [`Miroslava::run`] or
/// [`Miroslava::test_client`], which share it behind an `Arc`.
pub struct Miroslava {
    import_name: String,
    static_folder: Option<PathBuf>,
    static_url_path: Option<String>,
    template_folder: Option<PathBuf>,
    root_path: PathBuf,
    instance_path: Option<PathBuf>,
    config: Config,
    json: Option<Arc<dyn JsonProvider>>,
    url_map: Map,
    view_functions: BTreeMap<String, ViewFunction>,
}

impl fmt::Debug for Miroslava {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Miroslava")
            .field("import_name", &self.import_name)
            .field("root_path", &self.root_path)
            .field("config", &self.config)
            .field("url_map", &self.url_map)
            .field("endpoints", &self.view_functions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Miroslava {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Miroslava '{}'>", self.name())
    }
}

impl Miroslava {
    #[must_use]
    pub fn new(import_name: impl Into<String>) -> Self {
        Self::with_options(import_name, AppOptions::default())
    }

    #[must_use]
    pub fn with_options(import_name: impl Into<String>, options: AppOptions) -> Self {
        let AppOptions {
            static_folder,
            static_url_path,
            template_folder,
            root_path,
            instance_path,
            instance_relative_config,
        } = options;

        let mut root_path = root_path
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        if instance_relative_config {
            if let Some(instance_path) = &instance_path {
                root_path.clone_from(instance_path);
            }
        }

        let config = Config::from_env().unwrap_or_else(|e| {
            log::warn!("Ignoring invalid environment configuration: {e}");
            Config::default()
        });

        Self {
            import_name: import_name.into(),
            static_folder,
            static_url_path,
            template_folder,
            root_path,
            instance_path,
            config,
            json: None,
            url_map: Map::new(),
            view_functions: BTreeMap::new(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_json_provider(mut self, provider: impl JsonProvider + 'static) -> Self {
        self.json = Some(Arc::new(provider));
        self
    }

    /// The import name, or the executable's name for `__main__`.
    #[must_use]
    pub fn name(&self) -> String {
        if self.import_name == "__main__" {
            return std::env::current_exe()
                .ok()
                .and_then(|x| x.file_stem().map(|x| x.to_string_lossy().into_owned()))
                .unwrap_or_else(|| self.import_name.clone());
        }
        self.import_name.clone()
    }

    #[must_use]
    pub fn import_name(&self) -> &str {
        &self.import_name
    }

    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    #[must_use]
    pub fn instance_path(&self) -> Option<&Path> {
        self.instance_path.as_deref()
    }

    #[must_use]
    pub fn static_folder(&self) -> Option<&Path> {
        self.static_folder.as_deref()
    }

    /// URL prefix of static files, without slashes.
    #[must_use]
    pub fn static_url_path(&self) -> &str {
        self.static_url_path
            .as_deref()
            .map(|x| x.trim_matches('/'))
            .filter(|x| !x.is_empty())
            .unwrap_or(DEFAULT_STATIC_URL_PATH)
    }

    /// Absolute folder static files are served from.
    #[must_use]
    pub fn static_path(&self) -> PathBuf {
        self.static_folder
            .as_ref()
            .map_or_else(|| self.root_path.clone(), |x| self.root_path.join(x))
    }

    #[must_use]
    pub fn template_path(&self) -> PathBuf {
        self.root_path.join(
            self.template_folder
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_TEMPLATE_FOLDER)),
        )
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub const fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    #[must_use]
    pub const fn debug(&self) -> bool {
        self.config.debug
    }

    pub const fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
    }

    /// The installed JSON provider, or a [`DefaultJsonProvider`] following
    /// `JSON_COMPACT`.
    #[must_use]
    pub fn json_provider(&self) -> Arc<dyn JsonProvider> {
        self.json.clone().unwrap_or_else(|| {
            Arc::new(DefaultJsonProvider::new(self.config.json_compact))
        })
    }

    #[must_use]
    pub const fn url_map(&self) -> &Map {
        &self.url_map
    }

    /// Register a rule.
    ///
    /// With a view, the view is bound to the rule's endpoint. Without one,
    /// the rule is attached to whatever view the endpoint already has, which
    /// is how several URLs share a view.
    ///
    /// # Errors
    ///
    /// * If the rule fails to compile
    pub fn add_url_rule(
        &mut self,
        rule: &str,
        options: RouteOptions,
        view: Option<ViewFunction>,
    ) -> Result<&mut Self, Error> {
        let rule = Rule::new(rule, options)?;
        let endpoint = rule.endpoint().to_string();
        self.url_map.add(rule);

        if let Some(view) = view {
            if self.view_functions.insert(endpoint.clone(), view).is_some() {
                log::warn!("View function for endpoint '{endpoint}' was overwritten");
            }
        }

        Ok(self)
    }

    /// Register a `GET` view.
    ///
    /// # Errors
    ///
    /// * If the rule fails to compile
    pub fn route(&mut self, rule: &str, view: impl IntoView) -> Result<&mut Self, Error> {
        self.route_with(rule, RouteOptions::new(), view)
    }

    /// # Errors
    ///
    /// * If the rule fails to compile
    pub fn route_with(
        &mut self,
        rule: &str,
        options: RouteOptions,
        view: impl IntoView,
    ) -> Result<&mut Self, Error> {
        self.add_url_rule(rule, options, Some(view.into_view()))
    }

    /// Register the same view under several rules.
    ///
    /// The endpoint defaults to the first rule.
    ///
    /// # Errors
    ///
    /// * If a rule fails to compile
    pub fn routes<'a>(
        &mut self,
        rules: impl IntoIterator<Item = &'a str>,
        options: RouteOptions,
        view: impl IntoView,
    ) -> Result<&mut Self, Error> {
        let mut rules = rules.into_iter();
        let Some(first) = rules.next() else {
            return Ok(self);
        };
        let options = RouteOptions {
            endpoint: Some(options.endpoint.clone().unwrap_or_else(|| first.to_string())),
            ..options
        };

        self.add_url_rule(first, options.clone(), Some(view.into_view()))?;
        for rule in rules {
            self.add_url_rule(rule, options.clone(), None)?;
        }

        Ok(self)
    }

    fn method_route(
        &mut self,
        method: Method,
        rule: &str,
        view: impl IntoView,
    ) -> Result<&mut Self, Error> {
        self.route_with(rule, RouteOptions::new().methods([method]), view)
    }

    /// # Errors
    ///
    /// * If the rule fails to compile
    pub fn get(&mut self, rule: &str, view: impl IntoView) -> Result<&mut Self, Error> {
        self.method_route(Method::Get, rule, view)
    }

    /// # Errors
    ///
    /// * If the rule fails to compile
    pub fn post(&mut self, rule: &str, view: impl IntoView) -> Result<&mut Self, Error> {
        self.method_route(Method::Post, rule, view)
    }

    /// # Errors
    ///
    /// * If the rule fails to compile
    pub fn put(&mut self, rule: &str, view: impl IntoView) -> Result<&mut Self, Error> {
        self.method_route(Method::Put, rule, view)
    }

    /// # Errors
    ///
    /// * If the rule fails to compile
    pub fn delete(&mut self, rule: &str, view: impl IntoView) -> Result<&mut Self, Error> {
        self.method_route(Method::Delete, rule, view)
    }

    /// # Errors
    ///
    /// * If the rule fails to compile
    pub fn patch(&mut self, rule: &str, view: impl IntoView) -> Result<&mut Self, Error> {
        self.method_route(Method::Patch, rule, view)
    }

    /// Turn a view return value into a [`Response`].
    ///
    /// JSON values go through the app's JSON provider. A status or headers
    /// given next to the body override the ones of the body.
    ///
    /// # Errors
    ///
    /// * If the status is invalid
    /// * If a JSON body fails to serialize
    pub fn make_response(&self, rv: impl IntoResponse) -> Result<Response, Error> {
        let ReturnValue {
            body,
            status,
            headers,
        } = rv.into_return_value()?;

        let mut response = match body {
            ResponseBody::Response(response) => *response,
            ResponseBody::Json(value) => self.json_provider().response(&value)?,
            ResponseBody::Data(data) => Response::new(data),
        };

        if let Some(status) = status {
            response.set_status(status);
        }

        if let Some(headers) = headers {
            for (name, _) in headers.iter() {
                response.headers_mut().remove(name);
            }
            response.headers_mut().extend(headers.iter());
        }

        Ok(response)
    }

    /// Build the URL of `endpoint`, prefixed with `APPLICATION_ROOT`.
    ///
    /// # Errors
    ///
    /// * If the endpoint is unknown or the values don't fit any of its rules
    pub fn url_for<K: Into<String>, V: Into<UrlValue>>(
        &self,
        endpoint: &str,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<String, Error> {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<UrlValues>();
        let path = self.url_map.build(endpoint, &values)?;
        Ok(format!(
            "{}{path}",
            self.config.application_root.trim_end_matches('/')
        ))
    }

    fn is_static_prefixed(&self, path: &str) -> bool {
        path.trim_start_matches('/')
            .strip_prefix(self.static_url_path())
            .is_some_and(|x| x.starts_with('/'))
    }

    /// Strip the static URL prefix and serve the file from the static folder.
    ///
    /// # Errors
    ///
    /// * If the file exists but can't be read
    pub async fn send_static_file(&self, path: &str) -> Result<Response, Error> {
        let path = path.trim_start_matches('/');
        let path = path
            .strip_prefix(&format!("{}/", self.static_url_path()))
            .or_else(|| path.strip_prefix("static/"))
            .unwrap_or(path);

        static_files::send_from_directory(&self.static_path(), path).await
    }

    /// Route the request and run its view.
    ///
    /// Paths under the static URL prefix are always static files. Any other
    /// path is routed; when no rule matches and the last segment has a file
    /// extension, it is looked up as a static file before giving up with
    /// `404`.
    ///
    /// # Errors
    ///
    /// * If the view fails with anything but an [`HttpException`]
    /// * If the endpoint has no view
    /// * If the view's return value can't be turned into a response
    pub async fn dispatch_request(&self, request: Arc<Request>) -> Result<Response, Error> {
        let path = request.path().to_string();

        if self.is_static_prefixed(&path) {
            return self.send_static_file(&path).await;
        }

        let (endpoint, values) = match self.url_map.match_path(&path, request.method()) {
            RouteMatch::Found { rule, values } => (rule.endpoint().to_string(), values),
            RouteMatch::Options { allowed } => {
                return Ok(Response::empty().with_header("Allow", allow_header(&allowed)));
            }
            RouteMatch::MethodNotAllowed { allowed } => {
                return Ok(HttpException::new(StatusCode::MethodNotAllowed)
                    .to_response()
                    .with_header("Allow", allow_header(&allowed)));
            }
            RouteMatch::NotFound => {
                let last = path.rsplit('/').next().unwrap_or_default();
                if last.contains('.') {
                    return self.send_static_file(&path).await;
                }
                return Ok(HttpException::new(StatusCode::NotFound).to_response());
            }
        };

        let view = self
            .view_functions
            .get(&endpoint)
            .cloned()
            .ok_or_else(|| Error::MissingView(endpoint.clone()))?;

        miroslava_logging::debug_or_trace!(
            ("Dispatching {} {path} to '{endpoint}'", request.method()),
            ("Dispatching {} {path} to '{endpoint}' with {values:?}", request.method())
        );

        match view(ViewArgs::new(values, request)).await {
            Ok(rv) => self.make_response(rv),
            Err(Error::Http(e)) => Ok(e.to_response()),
            Err(e) => Err(e),
        }
    }

    /// Dispatch `request` with the application and request contexts bound.
    ///
    /// Errors become responses: [`HttpException`]s their own, anything else
    /// `500 Internal Server Error`.
    pub async fn full_dispatch(app: &Arc<Self>, request: Request) -> Response {
        let request = Arc::new(request);
        let app_ctx = AppContext::new(app.clone());
        let request_ctx = RequestContext::new(app.clone(), request.clone());

        let result = app_ctx
            .scope(request_ctx.scope(app.dispatch_request(request.clone())))
            .await;

        match result {
            Ok(response) => response,
            Err(Error::Http(e)) => e.to_response(),
            Err(e) => {
                log::error!("Exception on {} [{}]: {e:?}", request.path(), request.method());
                let exception = HttpException::new(StatusCode::InternalServerError);
                if app.debug() {
                    exception.with_description(format!("Internal Server Error: {e}"))
                } else {
                    exception
                }
                .to_response()
            }
        }
    }

    /// A client dispatching requests to this app without a socket.
    #[must_use]
    pub fn test_client(self) -> TestClient {
        TestClient::new(Arc::new(self))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{abort, environ::Environ};

    async fn index(_: ViewArgs) -> Result<&'static str, Error> {
        Ok("<h1>index</h1>")
    }

    fn request(head: &str) -> Arc<Request> {
        Arc::new(Request::new(Environ::parse_head(head.as_bytes())).unwrap())
    }

    #[test_log::test]
    fn name_is_import_name() {
        let app = Miroslava::new("shiganshina");
        assert_eq!(app.name(), "shiganshina");
        assert_eq!(app.to_string(), "<Miroslava 'shiganshina'>");
        assert_ne!(Miroslava::new("__main__").name(), "");
    }

    #[test_log::test]
    fn options_resolve_paths() {
        let app = Miroslava::with_options(
            "paths",
            AppOptions::new()
                .with_root_path("/srv/app")
                .with_static_url_path("/assets/"),
        );
        assert_eq!(app.static_path(), PathBuf::from("/srv/app/static"));
        assert_eq!(app.template_path(), PathBuf::from("/srv/app/templates"));
        assert_eq!(app.static_url_path(), "assets");

        let app = Miroslava::with_options(
            "paths",
            AppOptions::new()
                .with_root_path("/srv/app")
                .with_instance_path("/srv/instance")
                .with_instance_relative_config(true)
                .with_static_folder(None::<PathBuf>),
        );
        assert_eq!(app.root_path(), Path::new("/srv/instance"));
        assert_eq!(app.static_path(), PathBuf::from("/srv/instance"));
    }

    #[test_log::test]
    fn make_response_applies_status_and_headers() {
        let app = Miroslava::new("responses");

        let response = app.make_response(("created", 201)).unwrap();
        assert_eq!(response.status().to_string(), "201 Created");
        assert_eq!(response.text(), "created");

        let response = app
            .make_response((
                Response::new("x").with_header("X-Drink", "coffee"),
                StatusCode::ImATeapot,
                vec![("x-drink", "tea")],
            ))
            .unwrap();
        assert_eq!(response.status_code(), 418);
        assert_eq!(response.headers().get_all("X-Drink"), ["tea"]);

        let response = app
            .make_response(("{}", vec![("Content-Type", "application/json")]))
            .unwrap();
        assert_eq!(response.content_type(), Some("application/json"));
    }

    #[test_log::test]
    fn make_response_uses_json_provider() {
        let mut app = Miroslava::new("json");
        let response = app.make_response((json!({"a": 1}), 202)).unwrap();
        assert_eq!(response.status_code(), 202);
        assert_eq!(response.text(), "{\n  \"a\": 1\n}");

        app.config_mut().json_compact = Some(true);
        let response = app.make_response(json!({"a": 1})).unwrap();
        assert_eq!(response.text(), r#"{"a":1}"#);
    }

    #[test_log::test]
    fn url_for_builds_paths() {
        let mut app = Miroslava::new("urls");
        app.route_with("/post/<int:id>", RouteOptions::new().endpoint("post"), index)
            .unwrap();
        assert_eq!(app.url_for("post", [("id", 3)]).unwrap(), "/post/3");

        app.config_mut().application_root = "/blog/".to_string();
        assert_eq!(app.url_for("post", [("id", 3)]).unwrap(), "/blog/post/3");
        assert!(app.url_for("missing", Vec::<(String, UrlValue)>::new()).is_err());
    }

    #[test_log::test(tokio::test)]
    async fn dispatch_runs_view_with_values() {
        let mut app = Miroslava::new("dispatch");
        app.route("/", index)
            .unwrap()
            .route("/wish/<to>", |args: ViewArgs| async move {
                Ok::<_, Error>(format!("Happy birthday {}", args.get_str("to").unwrap_or_default()))
            })
            .unwrap();

        let response = app.dispatch_request(request("GET / HTTP/1.1")).await.unwrap();
        assert_eq!(response.text(), "<h1>index</h1>");

        let response = app
            .dispatch_request(request("GET /wish/Sasha HTTP/1.1"))
            .await
            .unwrap();
        assert_eq!(response.text(), "Happy birthday Sasha");
    }

    #[test_log::test(tokio::test)]
    async fn dispatch_turns_abort_into_response() {
        let mut app = Miroslava::new("abort");
        app.route("/brew", |_: ViewArgs| async move { Err::<&str, _>(abort(418)) })
            .unwrap();

        let response = app.dispatch_request(request("GET /brew HTTP/1.1")).await.unwrap();
        assert_eq!(response.status_code(), 418);
    }

    #[test_log::test(tokio::test)]
    async fn dispatch_reports_routing_failures() {
        let mut app = Miroslava::new("routing");
        app.post("/submit", index).unwrap();

        let response = app.dispatch_request(request("GET /submit HTTP/1.1")).await.unwrap();
        assert_eq!(response.status_code(), 405);
        assert_eq!(response.headers().get("Allow"), Some("POST, OPTIONS"));

        let response = app
            .dispatch_request(request("OPTIONS /submit HTTP/1.1"))
            .await
            .unwrap();
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.headers().get("Allow"), Some("POST, OPTIONS"));

        let response = app.dispatch_request(request("GET /nowhere HTTP/1.1")).await.unwrap();
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.text(), "Not Found");
    }

    #[test_log::test(tokio::test)]
    async fn endpoint_without_view_is_an_error() {
        let mut app = Miroslava::new("missing");
        app.add_url_rule("/", RouteOptions::new().endpoint("ghost"), None)
            .unwrap();

        let err = app.dispatch_request(request("GET / HTTP/1.1")).await.unwrap_err();
        assert!(matches!(err, Error::MissingView(x) if x == "ghost"));

        let response = Miroslava::full_dispatch(
            &Arc::new(app),
            Request::new(Environ::parse_head(b"GET / HTTP/1.1")).unwrap(),
        )
        .await;
        assert_eq!(response.status_code(), 500);
    }

    #[test_log::test(tokio::test)]
    async fn routes_share_one_view() {
        let mut app = Miroslava::new("stacking");
        app.routes(["/hi", "/hello", "/hola"], RouteOptions::new(), index)
            .unwrap();

        for path in ["/hi", "/hello", "/hola"] {
            let response = app
                .dispatch_request(request(&format!("GET {path} HTTP/1.1")))
                .await
                .unwrap();
            assert_eq!(response.text(), "<h1>index</h1>", "{path}");
        }
        assert_eq!(app.url_for("/hi", Vec::<(String, UrlValue)>::new()).unwrap(), "/hi");
    }
}
