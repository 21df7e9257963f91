fn main() {
    osmz_httpd::run();
}
